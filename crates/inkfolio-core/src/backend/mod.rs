//! Contract with the PDF processing service.
//!
//! The service owns the PDF bytes and performs every page mutation; the
//! editor only sends requests and folds the responses back into its state.

mod memory;
mod wire;

pub use memory::{thumbnail_urls, BackendCall, MemoryBackend};
pub use wire::{
    flatten_annotations, AddBlankPageRequest, AnnotateRequest, ExportAnnotation, ExportQuality,
    FileInfo, InsertImageRequest, PageCountResponse, PageFormat, PdfMetadata, RemovePagesRequest,
    ReorderPagesRequest, ReorderResponse, RotatePagesRequest, ThumbnailsResponse, UploadFile,
    UploadResponse,
};

use crate::document::DocumentId;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Operations offered by the PDF service.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Backend: Send + Sync {
    /// Upload a PDF and get its page count, sizes and thumbnails.
    fn upload(&self, file: UploadFile) -> BoxFuture<'_, BackendResult<UploadResponse>>;

    /// Merge two or more PDFs into a new document.
    fn merge(&self, files: Vec<UploadFile>) -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Convert images into a new PDF, one page each.
    fn images_to_pdf(
        &self,
        images: Vec<UploadFile>,
        page_format: PageFormat,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    fn remove_pages(&self, request: RemovePagesRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    fn reorder_pages(&self, request: ReorderPagesRequest)
        -> BoxFuture<'_, BackendResult<ReorderResponse>>;

    fn rotate_pages(&self, request: RotatePagesRequest)
        -> BoxFuture<'_, BackendResult<ThumbnailsResponse>>;

    fn add_blank_page(&self, request: AddBlankPageRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Insert an image as a new page at `position`.
    fn insert_image(&self, request: InsertImageRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Flatten annotations into the PDF.
    fn annotate(&self, request: AnnotateRequest) -> BoxFuture<'_, BackendResult<ThumbnailsResponse>>;

    fn file_info(&self, file_id: &DocumentId) -> BoxFuture<'_, BackendResult<FileInfo>>;
}

/// Operations offered by the PDF service (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Backend {
    /// Upload a PDF and get its page count, sizes and thumbnails.
    fn upload(&self, file: UploadFile) -> BoxFuture<'_, BackendResult<UploadResponse>>;

    /// Merge two or more PDFs into a new document.
    fn merge(&self, files: Vec<UploadFile>) -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Convert images into a new PDF, one page each.
    fn images_to_pdf(
        &self,
        images: Vec<UploadFile>,
        page_format: PageFormat,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    fn remove_pages(&self, request: RemovePagesRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    fn reorder_pages(&self, request: ReorderPagesRequest)
        -> BoxFuture<'_, BackendResult<ReorderResponse>>;

    fn rotate_pages(&self, request: RotatePagesRequest)
        -> BoxFuture<'_, BackendResult<ThumbnailsResponse>>;

    fn add_blank_page(&self, request: AddBlankPageRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Insert an image as a new page at `position`.
    fn insert_image(&self, request: InsertImageRequest)
        -> BoxFuture<'_, BackendResult<PageCountResponse>>;

    /// Flatten annotations into the PDF.
    fn annotate(&self, request: AnnotateRequest) -> BoxFuture<'_, BackendResult<ThumbnailsResponse>>;

    fn file_info(&self, file_id: &DocumentId) -> BoxFuture<'_, BackendResult<FileInfo>>;
}
