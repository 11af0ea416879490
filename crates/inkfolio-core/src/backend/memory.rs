//! In-memory PDF service.

use super::{
    AddBlankPageRequest, AnnotateRequest, Backend, BackendError, BackendResult, BoxFuture,
    FileInfo, InsertImageRequest, PageCountResponse, PageFormat, RemovePagesRequest,
    ReorderPagesRequest, ReorderResponse, RotatePagesRequest, ThumbnailsResponse, UploadFile,
    UploadResponse,
};
use crate::document::{DocumentId, PageSize, Rotation, ThumbnailRef};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

/// A request as received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Upload(String),
    Merge(Vec<String>),
    ImagesToPdf(Vec<String>, PageFormat),
    RemovePages(RemovePagesRequest),
    ReorderPages(ReorderPagesRequest),
    RotatePages(RotatePagesRequest),
    AddBlankPage(AddBlankPageRequest),
    InsertImage(InsertImageRequest),
    Annotate(AnnotateRequest),
    FileInfo(DocumentId),
}

#[derive(Debug, Clone)]
struct StoredPage {
    size: PageSize,
    rotation: Rotation,
}

#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    pages: Vec<StoredPage>,
}

impl StoredFile {
    fn new(name: impl Into<String>, sizes: impl IntoIterator<Item = PageSize>) -> Self {
        Self {
            name: name.into(),
            pages: sizes
                .into_iter()
                .map(|size| StoredPage {
                    size,
                    rotation: Rotation::Deg0,
                })
                .collect(),
        }
    }

    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn sizes(&self) -> Vec<PageSize> {
        self.pages.iter().map(|p| p.size).collect()
    }

    /// Insert a page so that it becomes page `position`. Returns the new count.
    fn insert_page(&mut self, position: u32, size: PageSize) -> BackendResult<u32> {
        if position < 1 || position > self.num_pages() + 1 {
            return Err(rejected("Position out of range"));
        }
        self.pages.insert(
            position as usize - 1,
            StoredPage {
                size,
                rotation: Rotation::Deg0,
            },
        );
        Ok(self.num_pages())
    }
}

/// PDF service simulated in memory, for tests and offline use.
///
/// Uploaded files get one Letter page unless their page sizes were
/// registered with [`with_pdf`](Self::with_pdf). Failures can be injected per
/// operation and every request is recorded.
#[derive(Default)]
pub struct MemoryBackend {
    files: RwLock<HashMap<String, StoredFile>>,
    registered: RwLock<HashMap<String, Vec<PageSize>>>,
    failures: RwLock<HashMap<&'static str, BackendError>>,
    misrouted: RwLock<BTreeSet<&'static str>>,
    calls: RwLock<Vec<BackendCall>>,
}

fn lock_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Transport(format!("Lock error: {}", e))
}

fn rejected(detail: impl Into<String>) -> BackendError {
    BackendError::Rejected {
        status: 400,
        detail: detail.into(),
    }
}

/// Thumbnail URLs in the service's `/api/thumbnail/{file_id}/{page}` layout.
pub fn thumbnail_urls(file_id: &str, num_pages: u32) -> Vec<ThumbnailRef> {
    (1..=num_pages)
        .map(|n| ThumbnailRef::new(format!("/api/thumbnail/{}/{}", file_id, n)))
        .collect()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the page sizes a PDF named `name` will have when uploaded.
    pub fn with_pdf(mut self, name: impl Into<String>, sizes: Vec<PageSize>) -> Self {
        if let Ok(registered) = self.registered.get_mut() {
            registered.insert(name.into(), sizes);
        }
        self
    }

    /// Make the next call to `operation` (a [`Backend`] method name) fail.
    pub fn fail_next(&self, operation: &'static str, error: BackendError) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(operation, error);
        }
    }

    /// Make the next response of `operation` carry a different file id, as if
    /// it belonged to a document that has since been replaced.
    pub fn misroute_next(&self, operation: &'static str) {
        if let Ok(mut misrouted) = self.misrouted.write() {
            misrouted.insert(operation);
        }
    }

    /// Requests received so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or_default()
    }

    /// Current page rotations of a stored file.
    pub fn rotations(&self, file_id: &str) -> Option<Vec<Rotation>> {
        let files = self.files.read().ok()?;
        files
            .get(file_id)
            .map(|f| f.pages.iter().map(|p| p.rotation).collect())
    }

    /// Record the call and apply any injected failure.
    fn begin(&self, operation: &'static str, call: BackendCall) -> BackendResult<()> {
        log::debug!("Backend request: {:?}", call);
        self.calls.write().map_err(lock_error)?.push(call);
        match self.failures.write().map_err(lock_error)?.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn response_id(&self, operation: &'static str, file_id: DocumentId) -> BackendResult<DocumentId> {
        if self.misrouted.write().map_err(lock_error)?.remove(operation) {
            return Ok(DocumentId::new(Uuid::new_v4().to_string()));
        }
        Ok(file_id)
    }

    fn store(&self, file: StoredFile) -> BackendResult<DocumentId> {
        let id = Uuid::new_v4().to_string();
        self.files.write().map_err(lock_error)?.insert(id.clone(), file);
        Ok(DocumentId::new(id))
    }

    fn with_file<T>(
        &self,
        file_id: &DocumentId,
        f: impl FnOnce(&mut StoredFile) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut files = self.files.write().map_err(lock_error)?;
        let file = files
            .get_mut(file_id.as_str())
            .ok_or_else(|| BackendError::NotFound(file_id.to_string()))?;
        f(file)
    }

    fn upload_sync(&self, file: UploadFile) -> BackendResult<UploadResponse> {
        self.begin("upload", BackendCall::Upload(file.name.clone()))?;
        if file.content_type != "application/pdf" {
            return Err(rejected(format!("Invalid file type: {}", file.name)));
        }
        let sizes = self
            .registered
            .read()
            .map_err(lock_error)?
            .get(&file.name)
            .cloned()
            .unwrap_or_else(|| vec![PageSize::LETTER]);
        let stored = StoredFile::new(file.name.clone(), sizes);
        let num_pages = stored.num_pages();
        let page_sizes = stored.sizes();
        let file_id = self.store(stored)?;
        Ok(UploadResponse {
            thumbnail_urls: thumbnail_urls(file_id.as_str(), num_pages),
            file_id: self.response_id("upload", file_id)?,
            original_name: file.name,
            num_pages,
            page_sizes,
        })
    }

    fn created(&self, operation: &'static str, stored: StoredFile) -> BackendResult<PageCountResponse> {
        let num_pages = stored.num_pages();
        let file_id = self.store(stored)?;
        Ok(PageCountResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(file_id.as_str(), num_pages),
            file_id: self.response_id(operation, file_id)?,
            num_pages,
        })
    }

    fn merge_sync(&self, files: Vec<UploadFile>) -> BackendResult<PageCountResponse> {
        let names = files.iter().map(|f| f.name.clone()).collect();
        self.begin("merge", BackendCall::Merge(names))?;
        if files.len() < 2 {
            return Err(rejected("At least 2 files required for merge"));
        }
        let registered = self.registered.read().map_err(lock_error)?.clone();
        let mut sizes = Vec::new();
        for file in &files {
            if file.content_type != "application/pdf" {
                return Err(rejected(format!("Invalid file type: {}", file.name)));
            }
            sizes.extend(
                registered
                    .get(&file.name)
                    .cloned()
                    .unwrap_or_else(|| vec![PageSize::LETTER]),
            );
        }
        self.created("merge", StoredFile::new("merged.pdf", sizes))
    }

    fn images_to_pdf_sync(
        &self,
        images: Vec<UploadFile>,
        page_format: PageFormat,
    ) -> BackendResult<PageCountResponse> {
        let names = images.iter().map(|f| f.name.clone()).collect();
        self.begin("images_to_pdf", BackendCall::ImagesToPdf(names, page_format))?;
        if images.is_empty() {
            return Err(rejected("No images provided"));
        }
        if let Some(bad) = images.iter().find(|f| !f.content_type.starts_with("image/")) {
            return Err(rejected(format!("Invalid image type: {}", bad.name)));
        }
        let sizes = images.iter().map(|_| page_format.size());
        self.created("images_to_pdf", StoredFile::new("converted.pdf", sizes))
    }

    fn remove_pages_sync(&self, request: RemovePagesRequest) -> BackendResult<PageCountResponse> {
        self.begin("remove_pages", BackendCall::RemovePages(request.clone()))?;
        let num_pages = self.with_file(&request.file_id, |file| {
            let doomed: BTreeSet<u32> = request.pages.iter().copied().collect();
            if doomed.iter().any(|&p| p < 1 || p > file.num_pages()) {
                return Err(rejected("Page number out of range"));
            }
            if doomed.len() as u32 >= file.num_pages() {
                return Err(rejected("Cannot remove all pages"));
            }
            let mut number = 0;
            file.pages.retain(|_| {
                number += 1;
                !doomed.contains(&number)
            });
            Ok(file.num_pages())
        })?;
        Ok(PageCountResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("remove_pages", request.file_id)?,
            num_pages,
        })
    }

    fn reorder_pages_sync(&self, request: ReorderPagesRequest) -> BackendResult<ReorderResponse> {
        self.begin("reorder_pages", BackendCall::ReorderPages(request.clone()))?;
        let num_pages = self.with_file(&request.file_id, |file| {
            let mut sorted = request.new_order.clone();
            sorted.sort_unstable();
            if sorted != (1..=file.num_pages()).collect::<Vec<_>>() {
                return Err(rejected("new_order must be a permutation of all pages"));
            }
            file.pages = request
                .new_order
                .iter()
                .map(|&n| file.pages[n as usize - 1].clone())
                .collect();
            Ok(file.num_pages())
        })?;
        Ok(ReorderResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("reorder_pages", request.file_id)?,
            new_order: request.new_order,
        })
    }

    fn rotate_pages_sync(&self, request: RotatePagesRequest) -> BackendResult<ThumbnailsResponse> {
        self.begin("rotate_pages", BackendCall::RotatePages(request.clone()))?;
        if request.rotation == Rotation::Deg0 {
            return Err(rejected("Rotation must be 90, 180, or 270"));
        }
        let num_pages = self.with_file(&request.file_id, |file| {
            for &n in &request.pages {
                if let Some(page) = file.pages.get_mut((n as usize).wrapping_sub(1)) {
                    page.rotation = page.rotation.rotated_by(request.rotation);
                }
            }
            Ok(file.num_pages())
        })?;
        Ok(ThumbnailsResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("rotate_pages", request.file_id)?,
        })
    }

    fn add_blank_page_sync(&self, request: AddBlankPageRequest) -> BackendResult<PageCountResponse> {
        self.begin("add_blank_page", BackendCall::AddBlankPage(request.clone()))?;
        let num_pages = self.with_file(&request.file_id, |file| {
            file.insert_page(request.position, request.page_size.size())
        })?;
        Ok(PageCountResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("add_blank_page", request.file_id)?,
            num_pages,
        })
    }

    fn insert_image_sync(&self, request: InsertImageRequest) -> BackendResult<PageCountResponse> {
        self.begin("insert_image", BackendCall::InsertImage(request.clone()))?;
        let num_pages = self.with_file(&request.file_id, |file| {
            if !request.image.content_type.starts_with("image/") {
                return Err(rejected("Invalid image type"));
            }
            file.insert_page(request.position, request.page_size.size())
        })?;
        Ok(PageCountResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("insert_image", request.file_id)?,
            num_pages,
        })
    }

    fn annotate_sync(&self, request: AnnotateRequest) -> BackendResult<ThumbnailsResponse> {
        self.begin("annotate", BackendCall::Annotate(request.clone()))?;
        let num_pages = self.with_file(&request.file_id, |file| Ok(file.num_pages()))?;
        if let Some(bad) = request
            .annotations
            .keys()
            .find(|k| k.parse::<u32>().map_or(true, |n| n < 1 || n > num_pages))
        {
            return Err(rejected(format!("Invalid page key: {}", bad)));
        }
        Ok(ThumbnailsResponse {
            success: true,
            thumbnail_urls: thumbnail_urls(request.file_id.as_str(), num_pages),
            file_id: self.response_id("annotate", request.file_id)?,
        })
    }

    fn file_info_sync(&self, file_id: DocumentId) -> BackendResult<FileInfo> {
        self.begin("file_info", BackendCall::FileInfo(file_id.clone()))?;
        let (name, num_pages, sizes) =
            self.with_file(&file_id, |file| Ok((file.name.clone(), file.num_pages(), file.sizes())))?;
        Ok(FileInfo {
            id: file_id,
            original_name: name,
            file_type: "pdf".to_string(),
            num_pages: Some(num_pages),
            page_sizes: sizes,
            metadata: None,
        })
    }
}

impl Backend for MemoryBackend {
    fn upload(&self, file: UploadFile) -> BoxFuture<'_, BackendResult<UploadResponse>> {
        Box::pin(async move { self.upload_sync(file) })
    }

    fn merge(&self, files: Vec<UploadFile>) -> BoxFuture<'_, BackendResult<PageCountResponse>> {
        Box::pin(async move { self.merge_sync(files) })
    }

    fn images_to_pdf(
        &self,
        images: Vec<UploadFile>,
        page_format: PageFormat,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>> {
        Box::pin(async move { self.images_to_pdf_sync(images, page_format) })
    }

    fn remove_pages(
        &self,
        request: RemovePagesRequest,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>> {
        Box::pin(async move { self.remove_pages_sync(request) })
    }

    fn reorder_pages(
        &self,
        request: ReorderPagesRequest,
    ) -> BoxFuture<'_, BackendResult<ReorderResponse>> {
        Box::pin(async move { self.reorder_pages_sync(request) })
    }

    fn rotate_pages(
        &self,
        request: RotatePagesRequest,
    ) -> BoxFuture<'_, BackendResult<ThumbnailsResponse>> {
        Box::pin(async move { self.rotate_pages_sync(request) })
    }

    fn add_blank_page(
        &self,
        request: AddBlankPageRequest,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>> {
        Box::pin(async move { self.add_blank_page_sync(request) })
    }

    fn insert_image(
        &self,
        request: InsertImageRequest,
    ) -> BoxFuture<'_, BackendResult<PageCountResponse>> {
        Box::pin(async move { self.insert_image_sync(request) })
    }

    fn annotate(&self, request: AnnotateRequest) -> BoxFuture<'_, BackendResult<ThumbnailsResponse>> {
        Box::pin(async move { self.annotate_sync(request) })
    }

    fn file_info(&self, file_id: &DocumentId) -> BoxFuture<'_, BackendResult<FileInfo>> {
        let file_id = file_id.clone();
        Box::pin(async move { self.file_info_sync(file_id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    fn uploaded(backend: &MemoryBackend, pages: usize) -> DocumentId {
        let name = format!("{}-pages.pdf", pages);
        let backend_sizes = vec![PageSize::A4; pages];
        if let Ok(mut registered) = backend.registered.write() {
            registered.insert(name.clone(), backend_sizes);
        }
        block_on(backend.upload(UploadFile::pdf(name, vec![0x25, 0x50])))
            .unwrap()
            .file_id
    }

    #[test]
    fn test_upload_uses_registered_sizes() {
        let backend = MemoryBackend::new().with_pdf("a.pdf", vec![PageSize::A4, PageSize::LETTER]);
        let response = block_on(backend.upload(UploadFile::pdf("a.pdf", Vec::new()))).unwrap();
        assert_eq!(response.num_pages, 2);
        assert_eq!(response.page_sizes, vec![PageSize::A4, PageSize::LETTER]);
        assert_eq!(
            response.thumbnail_urls[1].as_str(),
            format!("/api/thumbnail/{}/2", response.file_id)
        );
        assert_eq!(backend.calls(), vec![BackendCall::Upload("a.pdf".to_string())]);
    }

    #[test]
    fn test_upload_rejects_non_pdf() {
        let backend = MemoryBackend::new();
        let file = UploadFile {
            name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: Vec::new(),
        };
        let result = block_on(backend.upload(file));
        assert!(matches!(result, Err(BackendError::Rejected { status: 400, .. })));
        assert_eq!(backend.file_count(), 0);
    }

    #[test]
    fn test_remove_pages() {
        let backend = MemoryBackend::new();
        let id = uploaded(&backend, 3);
        let response = block_on(backend.remove_pages(RemovePagesRequest {
            file_id: id.clone(),
            pages: vec![2],
        }))
        .unwrap();
        assert_eq!(response.num_pages, 2);
        assert_eq!(response.thumbnail_urls.len(), 2);

        let all = block_on(backend.remove_pages(RemovePagesRequest {
            file_id: id,
            pages: vec![1, 2],
        }));
        assert!(matches!(all, Err(BackendError::Rejected { .. })));
    }

    #[test]
    fn test_reorder_validates_permutation() {
        let backend = MemoryBackend::new();
        let id = uploaded(&backend, 3);
        let bad = block_on(backend.reorder_pages(ReorderPagesRequest {
            file_id: id.clone(),
            new_order: vec![1, 1, 2],
        }));
        assert!(bad.is_err());
        let ok = block_on(backend.reorder_pages(ReorderPagesRequest {
            file_id: id,
            new_order: vec![3, 1, 2],
        }))
        .unwrap();
        assert_eq!(ok.new_order, vec![3, 1, 2]);
    }

    #[test]
    fn test_rotate_accumulates() {
        let backend = MemoryBackend::new();
        let id = uploaded(&backend, 2);
        for _ in 0..3 {
            block_on(backend.rotate_pages(RotatePagesRequest {
                file_id: id.clone(),
                pages: vec![2],
                rotation: Rotation::Deg180,
            }))
            .unwrap();
        }
        assert_eq!(
            backend.rotations(id.as_str()),
            Some(vec![Rotation::Deg0, Rotation::Deg180])
        );
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        let id = uploaded(&backend, 2);
        backend.fail_next("file_info", BackendError::Transport("offline".to_string()));
        assert!(matches!(
            block_on(backend.file_info(&id)),
            Err(BackendError::Transport(_))
        ));
        let info = block_on(backend.file_info(&id)).unwrap();
        assert_eq!(info.num_pages, Some(2));
    }

    #[test]
    fn test_unknown_file() {
        let backend = MemoryBackend::new();
        let result = block_on(backend.annotate(AnnotateRequest {
            file_id: DocumentId::new("missing"),
            annotations: Default::default(),
            quality: Default::default(),
        }));
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[test]
    fn test_insert_image() {
        let backend = MemoryBackend::new();
        let id = uploaded(&backend, 2);
        let image = UploadFile {
            name: "scan.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
        };
        let response = block_on(backend.insert_image(InsertImageRequest {
            file_id: id.clone(),
            position: 3,
            page_size: PageFormat::Letter,
            image: image.clone(),
        }))
        .unwrap();
        assert_eq!(response.num_pages, 3);
        let info = block_on(backend.file_info(&id)).unwrap();
        assert_eq!(info.page_sizes[2], PageSize::LETTER);

        let not_image = block_on(backend.insert_image(InsertImageRequest {
            file_id: id.clone(),
            position: 1,
            page_size: PageFormat::A4,
            image: UploadFile::pdf("a.pdf", Vec::new()),
        }));
        assert!(matches!(not_image, Err(BackendError::Rejected { status: 400, .. })));
        let out_of_range = block_on(backend.insert_image(InsertImageRequest {
            file_id: id,
            position: 9,
            page_size: PageFormat::A4,
            image,
        }));
        assert!(out_of_range.is_err());
    }

    #[test]
    fn test_merge_needs_two_files() {
        let backend = MemoryBackend::new();
        let one = block_on(backend.merge(vec![UploadFile::pdf("a.pdf", Vec::new())]));
        assert!(one.is_err());
        let two = block_on(backend.merge(vec![
            UploadFile::pdf("a.pdf", Vec::new()),
            UploadFile::pdf("b.pdf", Vec::new()),
        ]))
        .unwrap();
        assert_eq!(two.num_pages, 2);
    }
}
