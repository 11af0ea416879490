//! InkFolio Core Library
//!
//! Platform-agnostic document, annotation and history state for the InkFolio
//! PDF editor. The PDF bytes live in an external service reached through
//! [`Backend`]; this crate keeps page order, annotations, selection and tool
//! settings consistent and drives the live annotation surface.

pub mod annotation;
pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod input;
pub mod reorder;
pub mod selection;
pub mod session;
pub mod settings;
pub mod store;
pub mod surface;

pub use annotation::{Annotation, AnnotationId, SerializableColor, Stroke, StrokeKind, TextBox};
pub use backend::{Backend, BackendError, BackendResult, MemoryBackend};
pub use config::{EditorConfig, ReorderFailurePolicy};
pub use document::{Document, DocumentId, Page, PageId, PageNumber, PageSize, Rotation, ThumbnailRef};
pub use error::{EditorError, EditorResult};
pub use history::{History, HistoryEntry, MAX_UNDO_HISTORY};
pub use input::{Modifiers, NavKey};
pub use reorder::{DropOutcome, PageTile, ReorderController};
pub use selection::SelectionController;
pub use session::{EditorSession, ErrorChannel};
pub use settings::{Brush, TextStyle, ToolKind, ToolSettings, ToolSettingsPatch};
pub use store::{AnnotationMap, DocumentStore, UndoAction, UndoKind, UndoState};
pub use surface::{CanvasSync, DrawingSurface, RecordingSurface, SurfaceEvent};
