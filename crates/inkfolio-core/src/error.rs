//! Editor errors.

use crate::backend::BackendError;
use crate::document::PageNumber;
use thiserror::Error;

/// Errors raised by editor operations.
///
/// Local validation errors are produced before any backend call is made.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("No document is loaded")]
    NoDocument,
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: PageNumber, page_count: u32 },
    #[error("Invalid page order: {0}")]
    InvalidPermutation(String),
    #[error("Cannot delete every page of the document")]
    CannotDeleteAllPages,
    #[error("No pages selected")]
    EmptyPageSelection,
    #[error("Unsupported rotation of {0} degrees")]
    InvalidRotation(u32),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;
