//! Editing session: the store, its controllers and the PDF service.
//!
//! Every operation that needs the service follows the same shape: validate
//! locally, mark the session busy, await the backend, fold the response into
//! the store and clear the busy flag on every exit path. Failures end up in
//! the [`ErrorChannel`] as well as in the returned `Result`.

use crate::backend::{
    flatten_annotations, thumbnail_urls, AddBlankPageRequest, AnnotateRequest, Backend,
    InsertImageRequest, PageCountResponse, RemovePagesRequest, ReorderPagesRequest,
    RotatePagesRequest, UploadFile,
};
use crate::config::{EditorConfig, ReorderFailurePolicy};
use crate::document::{DocumentId, PageId, PageNumber, PageSize, Rotation, ThumbnailRef};
use crate::error::{EditorError, EditorResult};
use crate::input::{Modifiers, NavKey};
use crate::reorder::{DropOutcome, PageTile, ReorderController};
use crate::selection::SelectionController;
use crate::store::{DocumentStore, UndoKind};
use crate::surface::{CanvasSync, DrawingSurface, SurfaceEvent};
use kurbo::Point;
use std::collections::BTreeSet;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Single global error message that dismisses itself after a while.
#[derive(Debug, Clone)]
pub struct ErrorChannel {
    message: Option<(String, Instant)>,
    dismiss_after: Duration,
}

impl ErrorChannel {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            message: None,
            dismiss_after,
        }
    }

    /// Show `message`, replacing any message already shown.
    pub fn show(&mut self, message: impl Into<String>) {
        self.message = Some((message.into(), Instant::now()));
    }

    /// The visible message, if it has not expired yet.
    pub fn current(&self) -> Option<&str> {
        match &self.message {
            Some((message, shown)) if shown.elapsed() < self.dismiss_after => Some(message),
            _ => None,
        }
    }

    pub fn dismiss(&mut self) {
        self.message = None;
    }

    /// Drop an expired message. Returns true if one was dropped.
    pub fn tick(&mut self) -> bool {
        if self.message.is_some() && self.current().is_none() {
            self.message = None;
            return true;
        }
        false
    }
}

/// One open editing session against a PDF service.
pub struct EditorSession<B: Backend> {
    backend: Arc<B>,
    config: EditorConfig,
    store: DocumentStore,
    selection: SelectionController,
    reorder: ReorderController,
    canvas: CanvasSync,
    errors: ErrorChannel,
    busy: bool,
}

impl<B: Backend> EditorSession<B> {
    pub fn new(backend: Arc<B>, config: EditorConfig) -> Self {
        Self {
            store: DocumentStore::new(config.history_limit),
            reorder: ReorderController::new(config.drag_threshold),
            errors: ErrorChannel::new(config.error_dismiss_after()),
            selection: SelectionController::new(),
            canvas: CanvasSync::new(),
            backend,
            config,
            busy: false,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Direct store access for tool changes and annotation clearing.
    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// True while a backend request is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorChannel {
        &mut self.errors
    }

    pub fn error_message(&self) -> Option<&str> {
        self.errors.current()
    }

    fn begin(&mut self) {
        self.busy = true;
    }

    fn finish<T>(&mut self, result: EditorResult<T>) -> EditorResult<T> {
        self.busy = false;
        if let Err(err) = &result {
            log::warn!("Operation failed: {}", err);
            self.errors.show(err.to_string());
        }
        result
    }

    /// Whether a response for `file_id` still applies to the loaded document.
    fn is_current(&self, file_id: &DocumentId) -> bool {
        if self.store.document_id() == Some(file_id) {
            return true;
        }
        log::warn!(
            "Discarding stale response for {} (loaded: {:?})",
            file_id,
            self.store.document_id().map(DocumentId::as_str)
        );
        false
    }

    fn require_document_id(&self) -> EditorResult<DocumentId> {
        self.store.document_id().cloned().ok_or(EditorError::NoDocument)
    }

    fn loaded(&mut self) {
        self.selection.reset();
        self.reorder.cancel();
    }

    // --- Loading ---

    /// Upload a PDF and make it the current document.
    pub async fn upload(&mut self, file: UploadFile) -> EditorResult<()> {
        self.begin();
        let result = self.upload_inner(file).await;
        self.finish(result)
    }

    async fn upload_inner(&mut self, file: UploadFile) -> EditorResult<()> {
        let backend = Arc::clone(&self.backend);
        let response = backend.upload(file).await?;
        self.store.load_document(
            response.file_id,
            response.original_name,
            response.num_pages,
            &response.page_sizes,
            &response.thumbnail_urls,
        );
        self.loaded();
        Ok(())
    }

    /// Merge PDFs on the service and open the result.
    pub async fn merge(&mut self, files: Vec<UploadFile>) -> EditorResult<()> {
        self.begin();
        let result = self.merge_inner(files).await;
        self.finish(result)
    }

    async fn merge_inner(&mut self, files: Vec<UploadFile>) -> EditorResult<()> {
        let backend = Arc::clone(&self.backend);
        let response = backend.merge(files).await?;
        self.open_created(response.file_id, "merged.pdf", response.num_pages, response.thumbnail_urls)
            .await;
        Ok(())
    }

    /// Convert images to a PDF on the service and open the result.
    pub async fn images_to_pdf(&mut self, images: Vec<UploadFile>) -> EditorResult<()> {
        self.begin();
        let result = self.images_to_pdf_inner(images).await;
        self.finish(result)
    }

    async fn images_to_pdf_inner(&mut self, images: Vec<UploadFile>) -> EditorResult<()> {
        let backend = Arc::clone(&self.backend);
        let response = backend
            .images_to_pdf(images, self.config.blank_page_format)
            .await?;
        self.open_created(response.file_id, "converted.pdf", response.num_pages, response.thumbnail_urls)
            .await;
        Ok(())
    }

    /// Reopen a file the service already holds.
    pub async fn open_existing(&mut self, file_id: DocumentId) -> EditorResult<()> {
        self.begin();
        let result = self.open_existing_inner(file_id).await;
        self.finish(result)
    }

    async fn open_existing_inner(&mut self, file_id: DocumentId) -> EditorResult<()> {
        let backend = Arc::clone(&self.backend);
        let info = backend.file_info(&file_id).await?;
        let num_pages = info.num_pages.unwrap_or_default();
        let thumbnails = thumbnail_urls(file_id.as_str(), num_pages);
        self.store.load_document(
            info.id,
            info.original_name,
            num_pages,
            &info.page_sizes,
            &thumbnails,
        );
        self.loaded();
        Ok(())
    }

    /// Load a document the service just created. Page sizes come from a
    /// follow-up info request; if that fails the pages keep default sizes.
    async fn open_created(
        &mut self,
        file_id: DocumentId,
        name: &str,
        num_pages: u32,
        thumbnails: Vec<ThumbnailRef>,
    ) {
        let backend = Arc::clone(&self.backend);
        let (name, sizes) = match backend.file_info(&file_id).await {
            Ok(info) => (info.original_name, info.page_sizes),
            Err(err) => {
                log::warn!("Could not fetch page sizes for {}: {}", file_id, err);
                (name.to_string(), Vec::new())
            }
        };
        self.store
            .load_document(file_id, name, num_pages, &sizes, &thumbnails);
        self.loaded();
    }

    // --- Page operations ---

    /// Delete the selected pages.
    pub async fn delete_selected_pages(&mut self) -> EditorResult<()> {
        let pages: Vec<PageNumber> = self.store.selection().iter().copied().collect();
        self.delete_pages(&pages).await
    }

    pub async fn delete_pages(&mut self, pages: &[PageNumber]) -> EditorResult<()> {
        self.begin();
        let result = self.delete_pages_inner(pages).await;
        self.finish(result)
    }

    async fn delete_pages_inner(&mut self, pages: &[PageNumber]) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        let pages: BTreeSet<PageNumber> = pages.iter().copied().collect();
        if pages.is_empty() {
            return Err(EditorError::EmptyPageSelection);
        }
        let page_count = self.store.page_count();
        if let Some(&page) = pages.iter().find(|&&p| p < 1 || p > page_count) {
            return Err(EditorError::PageOutOfRange { page, page_count });
        }
        if pages.len() as u32 >= page_count {
            return Err(EditorError::CannotDeleteAllPages);
        }

        let pages: Vec<PageNumber> = pages.into_iter().collect();
        let backend = Arc::clone(&self.backend);
        let response = backend
            .remove_pages(RemovePagesRequest {
                file_id,
                pages: pages.clone(),
            })
            .await?;
        if !self.is_current(&response.file_id) {
            return Ok(());
        }
        self.store.apply_page_removal(&pages)?;
        self.store.clear_selection();
        self.selection.reset();
        self.store.update_thumbnails(&response.thumbnail_urls);
        if response.num_pages != self.store.page_count() {
            log::warn!(
                "Service reports {} pages after removal, local model has {}",
                response.num_pages,
                self.store.page_count()
            );
        }
        Ok(())
    }

    /// Reorder pages locally, then on the service.
    ///
    /// `new_order[i]` is the old page number placed at position `i + 1`. If
    /// the service refuses, the local reorder is rolled back unless the
    /// configuration says to keep it.
    pub async fn commit_reorder(&mut self, new_order: &[PageNumber]) -> EditorResult<()> {
        self.begin();
        let result = self.commit_reorder_inner(new_order).await;
        self.finish(result)
    }

    async fn commit_reorder_inner(&mut self, new_order: &[PageNumber]) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        if !self.store.reorder_pages(new_order)? {
            return Ok(());
        }
        let backend = Arc::clone(&self.backend);
        let request = ReorderPagesRequest {
            file_id,
            new_order: new_order.to_vec(),
        };
        match backend.reorder_pages(request).await {
            Ok(response) => {
                if self.is_current(&response.file_id) {
                    self.store.update_thumbnails(&response.thumbnail_urls);
                }
                Ok(())
            }
            Err(err) => {
                match self.config.reorder_failure {
                    ReorderFailurePolicy::Rollback => {
                        log::info!("Rolling back page reorder");
                        self.store.revert_last();
                    }
                    ReorderFailurePolicy::KeepLocal => {
                        log::info!("Keeping local page order after failed reorder");
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Rotate pages clockwise by `degrees` (90, 180 or 270).
    pub async fn rotate_pages(&mut self, pages: &[PageNumber], degrees: u32) -> EditorResult<()> {
        self.begin();
        let result = self.rotate_pages_inner(pages, degrees).await;
        self.finish(result)
    }

    async fn rotate_pages_inner(&mut self, pages: &[PageNumber], degrees: u32) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        let rotation = Rotation::try_from(degrees)?;
        if rotation == Rotation::Deg0 {
            return Err(EditorError::InvalidRotation(degrees));
        }
        if pages.is_empty() {
            return Err(EditorError::EmptyPageSelection);
        }
        let pages: Vec<PageNumber> = pages.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let previous = self.current_rotations(&pages)?;
        for (&page, &before) in pages.iter().zip(&previous) {
            self.store.set_page_rotation(page, before.rotated_by(rotation))?;
        }

        let backend = Arc::clone(&self.backend);
        let request = RotatePagesRequest {
            file_id,
            pages: pages.clone(),
            rotation,
        };
        match backend.rotate_pages(request).await {
            Ok(response) => {
                if self.is_current(&response.file_id) {
                    self.store.update_thumbnails(&response.thumbnail_urls);
                }
                Ok(())
            }
            Err(err) => {
                for (&page, &before) in pages.iter().zip(&previous) {
                    self.store.set_page_rotation(page, before)?;
                }
                Err(err.into())
            }
        }
    }

    fn current_rotations(&self, pages: &[PageNumber]) -> EditorResult<Vec<Rotation>> {
        let doc = self.store.document().ok_or(EditorError::NoDocument)?;
        pages
            .iter()
            .map(|&page| {
                doc.check_page(page)?;
                Ok(doc.page(page).map(|p| p.rotation).unwrap_or_default())
            })
            .collect()
    }

    /// Insert a blank page so that it becomes page `position`.
    pub async fn add_blank_page(&mut self, position: PageNumber) -> EditorResult<()> {
        self.begin();
        let result = self.add_blank_page_inner(position).await;
        self.finish(result)
    }

    async fn add_blank_page_inner(&mut self, position: PageNumber) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        self.check_insert_position(position)?;
        let format = self.config.blank_page_format;
        let backend = Arc::clone(&self.backend);
        let response = backend
            .add_blank_page(AddBlankPageRequest {
                file_id,
                position,
                page_size: format,
            })
            .await?;
        self.page_inserted(position, format.size(), response)
    }

    /// Insert an image as a new page so that it becomes page `position`.
    pub async fn insert_image(
        &mut self,
        position: PageNumber,
        image: UploadFile,
    ) -> EditorResult<()> {
        self.begin();
        let result = self.insert_image_inner(position, image).await;
        self.finish(result)
    }

    async fn insert_image_inner(
        &mut self,
        position: PageNumber,
        image: UploadFile,
    ) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        self.check_insert_position(position)?;
        let format = self.config.blank_page_format;
        let backend = Arc::clone(&self.backend);
        let response = backend
            .insert_image(InsertImageRequest {
                file_id,
                position,
                page_size: format,
                image,
            })
            .await?;
        self.page_inserted(position, format.size(), response)
    }

    fn check_insert_position(&self, position: PageNumber) -> EditorResult<()> {
        let page_count = self.store.page_count();
        if position < 1 || position > page_count + 1 {
            return Err(EditorError::PageOutOfRange {
                page: position,
                page_count,
            });
        }
        Ok(())
    }

    fn page_inserted(
        &mut self,
        position: PageNumber,
        size: PageSize,
        response: PageCountResponse,
    ) -> EditorResult<()> {
        if !self.is_current(&response.file_id) {
            return Ok(());
        }
        self.store
            .apply_page_insertion(position, size, ThumbnailRef::default())?;
        self.store.update_thumbnails(&response.thumbnail_urls);
        Ok(())
    }

    /// Send the committed annotations to the service for flattening.
    ///
    /// Returns `Ok(false)` without contacting the service when there is
    /// nothing to export. The annotations stay in the store.
    pub async fn export_annotations(&mut self) -> EditorResult<bool> {
        self.begin();
        let result = self.export_annotations_inner().await;
        self.finish(result)
    }

    async fn export_annotations_inner(&mut self) -> EditorResult<bool> {
        let file_id = self.require_document_id()?;
        let annotations = flatten_annotations(self.store.annotations());
        if annotations.is_empty() {
            log::debug!("No annotations to export");
            return Ok(false);
        }
        let backend = Arc::clone(&self.backend);
        let response = backend
            .annotate(AnnotateRequest {
                file_id,
                annotations,
                quality: self.config.export_quality,
            })
            .await?;
        if self.is_current(&response.file_id) {
            self.store.update_thumbnails(&response.thumbnail_urls);
        }
        Ok(true)
    }

    // --- History ---

    /// Undo the last action. A page reorder is also undone on the service.
    pub async fn undo(&mut self) -> EditorResult<bool> {
        self.step_history(true).await
    }

    /// Redo the last undone action. A page reorder is also redone on the service.
    pub async fn redo(&mut self) -> EditorResult<bool> {
        self.step_history(false).await
    }

    async fn step_history(&mut self, undo: bool) -> EditorResult<bool> {
        let history = self.store.history();
        let entry = if undo {
            history.undo_entries().last()
        } else {
            history.redo_entries().last()
        };
        let Some(entry) = entry else {
            return Ok(false);
        };
        let moves_pages = entry.steps.iter().any(|s| s.kind() == UndoKind::Reorder);
        let before = self.store.document().map(|d| d.order()).unwrap_or_default();

        let applied = if undo { self.store.undo() } else { self.store.redo() };
        if !applied || !moves_pages {
            return Ok(applied);
        }

        self.begin();
        let result = self.push_order(&before).await;
        if result.is_err() {
            // Put the local order back in line with the service.
            if undo {
                self.store.redo();
            } else {
                self.store.undo();
            }
        }
        self.finish(result).map(|()| true)
    }

    /// Tell the service about a local order change from `before` to the
    /// current order.
    async fn push_order(&mut self, before: &[PageId]) -> EditorResult<()> {
        let file_id = self.require_document_id()?;
        let doc = self.store.document().ok_or(EditorError::NoDocument)?;
        let new_order: Option<Vec<PageNumber>> = doc
            .order()
            .iter()
            .map(|id| before.iter().position(|b| b == id).map(|i| i as PageNumber + 1))
            .collect();
        let Some(new_order) = new_order else {
            return Err(EditorError::InvalidPermutation(
                "page set changed during undo".to_string(),
            ));
        };
        let backend = Arc::clone(&self.backend);
        let response = backend
            .reorder_pages(ReorderPagesRequest { file_id, new_order })
            .await?;
        if self.is_current(&response.file_id) {
            self.store.update_thumbnails(&response.thumbnail_urls);
        }
        Ok(())
    }

    // --- Page grid input ---

    pub fn click_page(&mut self, page: PageNumber, modifiers: Modifiers) {
        self.selection.click(&mut self.store, page, modifiers);
    }

    /// Returns true if the key was consumed.
    pub fn page_key(&mut self, key: NavKey, modifiers: Modifiers) -> bool {
        if key == NavKey::Escape && self.reorder.is_dragging() {
            self.reorder.cancel();
            return true;
        }
        self.selection.key(&mut self.store, key, modifiers)
    }

    pub fn page_pointer_down(&mut self, page: PageNumber, position: Point) {
        self.reorder.pointer_down(page, position);
    }

    /// Returns true when this move starts a drag.
    pub fn page_pointer_move(&mut self, position: Point) -> bool {
        self.reorder.pointer_move(position)
    }

    pub fn dragged_page(&self) -> Option<PageNumber> {
        self.reorder.dragged_page()
    }

    /// Finish a page-grid gesture: a short press selects, a drag reorders.
    pub async fn page_pointer_up(
        &mut self,
        position: Point,
        tiles: &[PageTile],
        modifiers: Modifiers,
    ) -> EditorResult<()> {
        let page_count = self.store.page_count();
        match self.reorder.pointer_up(position, tiles, page_count) {
            DropOutcome::Click(page) => {
                self.click_page(page, modifiers);
                Ok(())
            }
            DropOutcome::Reorder { new_order, .. } => self.commit_reorder(&new_order).await,
            DropOutcome::None | DropOutcome::Cancelled => Ok(()),
        }
    }

    // --- Annotation surface ---

    pub fn open_page<S: DrawingSurface>(&mut self, surface: &mut S, page: PageNumber) -> EditorResult<()> {
        let result = self.canvas.open_page(&mut self.store, surface, page);
        self.report(result)
    }

    pub fn close_page<S: DrawingSurface>(&mut self, surface: &mut S) {
        self.canvas.close_page(&mut self.store, surface);
    }

    pub fn handle_surface_event<S: DrawingSurface>(
        &mut self,
        surface: &mut S,
        event: SurfaceEvent,
    ) -> EditorResult<()> {
        let result = self.canvas.handle_event(&mut self.store, surface, event);
        self.report(result)
    }

    /// Bring the surface up to date after changes made outside its events.
    pub fn refresh_surface<S: DrawingSurface>(&mut self, surface: &mut S) {
        self.canvas.refresh(&mut self.store, surface);
    }

    /// Page size of the open page, for sizing the surface.
    pub fn open_page_size(&self) -> Option<PageSize> {
        let page = self.store.current_page()?;
        self.store.document()?.page(page).map(|p| p.size)
    }

    fn report<T>(&mut self, result: EditorResult<T>) -> EditorResult<T> {
        if let Err(err) = &result {
            self.errors.show(err.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, SerializableColor, Stroke, StrokeKind};
    use crate::backend::{BackendCall, BackendError, ExportAnnotation, MemoryBackend};
    use crate::settings::ToolKind;
    use crate::surface::RecordingSurface;
    use kurbo::Rect;
    use pollster::block_on;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn session_with(pages: usize, config: EditorConfig) -> EditorSession<MemoryBackend> {
        init_logger();
        let backend = MemoryBackend::new().with_pdf("doc.pdf", vec![PageSize::A4; pages]);
        let mut session = EditorSession::new(Arc::new(backend), config);
        block_on(session.upload(UploadFile::pdf("doc.pdf", vec![1, 2, 3]))).unwrap();
        session
    }

    fn session(pages: usize) -> EditorSession<MemoryBackend> {
        session_with(pages, EditorConfig::default())
    }

    fn stroke() -> Annotation {
        Annotation::Stroke(Stroke::new(
            StrokeKind::Pen,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        ))
    }

    fn thumbnails(session: &EditorSession<MemoryBackend>) -> Vec<String> {
        session
            .store()
            .document()
            .unwrap()
            .pages
            .iter()
            .map(|p| p.thumbnail.as_str().to_string())
            .collect()
    }

    fn last_call(session: &EditorSession<MemoryBackend>) -> BackendCall {
        session.backend().calls().pop().unwrap()
    }

    #[test]
    fn test_upload_loads_document() {
        let session = session(3);
        let doc = session.store().document().unwrap();
        assert_eq!(doc.name, "doc.pdf");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[2].size, PageSize::A4);
        assert!(doc.pages[0].thumbnail.as_str().ends_with("/1"));
        assert!(!session.is_busy());
        assert!(session.error_message().is_none());
    }

    #[test]
    fn test_delete_requires_selection() {
        let mut session = session(3);
        let calls = session.backend().calls().len();
        let result = block_on(session.delete_selected_pages());
        assert!(matches!(result, Err(EditorError::EmptyPageSelection)));
        assert_eq!(session.backend().calls().len(), calls);
        assert!(!session.is_busy());
        assert_eq!(session.error_message(), Some("No pages selected"));
    }

    #[test]
    fn test_cannot_delete_every_page() {
        let mut session = session(2);
        session.store_mut().select_all();
        let result = block_on(session.delete_selected_pages());
        assert!(matches!(result, Err(EditorError::CannotDeleteAllPages)));
        assert_eq!(session.store().page_count(), 2);
    }

    #[test]
    fn test_delete_pages_shifts_annotations() {
        let mut session = session(4);
        let kept = stroke();
        let kept_id = kept.id();
        session.store_mut().add_annotation(2, stroke()).unwrap();
        session.store_mut().add_annotation(4, kept).unwrap();
        session.click_page(1, Modifiers::NONE);
        session.click_page(2, Modifiers::ctrl());

        block_on(session.delete_selected_pages()).unwrap();
        assert_eq!(session.store().page_count(), 2);
        assert!(session.store().find_annotation(2, kept_id).is_some());
        assert_eq!(session.store().annotation_count(), 1);
        assert!(session.store().selection().is_empty());
        assert!(matches!(last_call(&session), BackendCall::RemovePages(r) if r.pages == vec![1, 2]));
    }

    #[test]
    fn test_reorder_success() {
        let mut session = session(3);
        block_on(session.commit_reorder(&[3, 1, 2])).unwrap();
        assert!(matches!(
            last_call(&session),
            BackendCall::ReorderPages(r) if r.new_order == vec![3, 1, 2]
        ));
        assert!(session.store().can_undo());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_failed_reorder_rolls_back() {
        let mut session = session(3);
        session.store_mut().add_annotation(1, stroke()).unwrap();
        let order = session.store().document().unwrap().order();
        let undo_len = session.store().history().undo_len();

        session
            .backend()
            .fail_next("reorder_pages", BackendError::Transport("offline".to_string()));
        let result = block_on(session.commit_reorder(&[2, 3, 1]));
        assert!(matches!(result, Err(EditorError::Backend(_))));
        assert_eq!(session.store().document().unwrap().order(), order);
        assert!(session.store().annotations_for(1).is_some());
        assert_eq!(session.store().history().undo_len(), undo_len);
        assert!(!session.store().can_redo());
        assert!(!session.is_busy());
        assert!(session.error_message().unwrap().contains("offline"));
    }

    #[test]
    fn test_failed_reorder_can_keep_local_order() {
        let config = EditorConfig {
            reorder_failure: ReorderFailurePolicy::KeepLocal,
            ..EditorConfig::default()
        };
        let mut session = session_with(3, config);
        let order = session.store().document().unwrap().order();
        session.backend().fail_next(
            "reorder_pages",
            BackendError::Rejected {
                status: 500,
                detail: "boom".to_string(),
            },
        );
        assert!(block_on(session.commit_reorder(&[2, 3, 1])).is_err());
        assert_ne!(session.store().document().unwrap().order(), order);
        assert!(session.store().can_undo());
    }

    #[test]
    fn test_failed_reorder_keeps_redo_history() {
        let mut session = session(3);
        session.store_mut().add_annotation(1, stroke()).unwrap();
        assert!(block_on(session.undo()).unwrap());
        assert!(session.store().can_redo());

        session
            .backend()
            .fail_next("reorder_pages", BackendError::Transport("offline".to_string()));
        assert!(block_on(session.commit_reorder(&[3, 1, 2])).is_err());
        assert!(session.store().can_redo());
        assert!(block_on(session.redo()).unwrap());
        assert!(session.store().annotations_for(1).is_some());
    }

    #[test]
    fn test_invalid_reorder_never_reaches_backend() {
        let mut session = session(3);
        let calls = session.backend().calls().len();
        assert!(block_on(session.commit_reorder(&[1, 1, 2])).is_err());
        assert!(block_on(session.commit_reorder(&[1, 2, 3])).is_ok());
        assert_eq!(session.backend().calls().len(), calls);
    }

    #[test]
    fn test_undo_reorder_updates_backend() {
        let mut session = session(3);
        block_on(session.commit_reorder(&[2, 3, 1])).unwrap();
        assert!(block_on(session.undo()).unwrap());
        assert!(matches!(
            last_call(&session),
            BackendCall::ReorderPages(r) if r.new_order == vec![3, 1, 2]
        ));
        assert!(block_on(session.redo()).unwrap());
        assert!(matches!(
            last_call(&session),
            BackendCall::ReorderPages(r) if r.new_order == vec![2, 3, 1]
        ));
    }

    #[test]
    fn test_undo_annotation_stays_local() {
        let mut session = session(1);
        session.store_mut().add_annotation(1, stroke()).unwrap();
        let calls = session.backend().calls().len();
        assert!(block_on(session.undo()).unwrap());
        assert_eq!(session.backend().calls().len(), calls);
        assert!(!block_on(session.undo()).unwrap());
    }

    #[test]
    fn test_rotate_validates_and_applies() {
        let mut session = session(2);
        let calls = session.backend().calls().len();
        assert!(matches!(
            block_on(session.rotate_pages(&[1], 45)),
            Err(EditorError::InvalidRotation(45))
        ));
        assert!(matches!(
            block_on(session.rotate_pages(&[1], 0)),
            Err(EditorError::InvalidRotation(0))
        ));
        assert!(matches!(
            block_on(session.rotate_pages(&[], 90)),
            Err(EditorError::EmptyPageSelection)
        ));
        assert_eq!(session.backend().calls().len(), calls);

        block_on(session.rotate_pages(&[2], 90)).unwrap();
        block_on(session.rotate_pages(&[2], 180)).unwrap();
        let doc = session.store().document().unwrap();
        assert_eq!(doc.page(2).unwrap().rotation, Rotation::Deg270);
        assert_eq!(doc.page(1).unwrap().rotation, Rotation::Deg0);
    }

    #[test]
    fn test_failed_rotation_restores_local_state() {
        let mut session = session(2);
        session
            .backend()
            .fail_next("rotate_pages", BackendError::Transport("offline".to_string()));
        assert!(block_on(session.rotate_pages(&[1], 90)).is_err());
        let doc = session.store().document().unwrap();
        assert_eq!(doc.page(1).unwrap().rotation, Rotation::Deg0);
    }

    #[test]
    fn test_add_blank_page() {
        let mut session = session(2);
        let a = stroke();
        let a_id = a.id();
        session.store_mut().add_annotation(1, a).unwrap();
        block_on(session.add_blank_page(1)).unwrap();
        assert_eq!(session.store().page_count(), 3);
        assert!(session.store().find_annotation(2, a_id).is_some());
        assert_eq!(thumbnails(&session).len(), 3);
        assert!(!thumbnails(&session)[2].is_empty());
        assert!(block_on(session.add_blank_page(9)).is_err());
    }

    #[test]
    fn test_insert_image() {
        let mut session = session(2);
        let a = stroke();
        let a_id = a.id();
        session.store_mut().add_annotation(2, a).unwrap();
        let image = UploadFile {
            name: "scan.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
        };
        block_on(session.insert_image(2, image.clone())).unwrap();
        assert_eq!(session.store().page_count(), 3);
        assert!(session.store().find_annotation(3, a_id).is_some());
        assert!(matches!(
            last_call(&session),
            BackendCall::InsertImage(r) if r.position == 2 && r.page_size == crate::backend::PageFormat::A4
        ));

        let calls = session.backend().calls().len();
        assert!(matches!(
            block_on(session.insert_image(5, image.clone())),
            Err(EditorError::PageOutOfRange { page: 5, page_count: 3 })
        ));
        assert_eq!(session.backend().calls().len(), calls);

        session.backend().misroute_next("insert_image");
        block_on(session.insert_image(1, image)).unwrap();
        assert_eq!(session.store().page_count(), 3);

        let rejected = block_on(session.insert_image(1, UploadFile::pdf("x.pdf", Vec::new())));
        assert!(rejected.is_err());
        assert!(session.error_message().unwrap().contains("Invalid image type"));
        assert!(!session.is_busy());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut session = session(2);
        session.backend().misroute_next("add_blank_page");
        block_on(session.add_blank_page(3)).unwrap();
        assert_eq!(session.store().page_count(), 2);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_export_annotations() {
        let mut session = session(2);
        assert!(!block_on(session.export_annotations()).unwrap());

        session.store_mut().add_annotation(2, stroke()).unwrap();
        assert!(block_on(session.export_annotations()).unwrap());
        let BackendCall::Annotate(request) = last_call(&session) else {
            panic!("expected annotate call");
        };
        assert_eq!(request.quality, crate::backend::ExportQuality::High);
        assert!(matches!(
            request.annotations["2"][0],
            ExportAnnotation::Pen { ref color, .. } if color == "#000000"
        ));
        assert_eq!(session.store().annotation_count(), 1);
    }

    #[test]
    fn test_drag_gesture_reorders() {
        let mut session = session(3);
        let tiles: Vec<PageTile> = (1..=3)
            .map(|page| {
                let x = (page - 1) as f64 * 100.0;
                PageTile {
                    page,
                    rect: Rect::new(x, 0.0, x + 80.0, 100.0),
                }
            })
            .collect();

        session.page_pointer_down(1, Point::new(40.0, 50.0));
        session.page_pointer_move(Point::new(42.0, 50.0));
        block_on(session.page_pointer_up(Point::new(42.0, 50.0), &tiles, Modifiers::NONE)).unwrap();
        assert!(session.store().is_selected(1));

        session.page_pointer_down(1, Point::new(40.0, 50.0));
        assert!(session.page_pointer_move(Point::new(150.0, 50.0)));
        assert_eq!(session.dragged_page(), Some(1));
        block_on(session.page_pointer_up(Point::new(240.0, 50.0), &tiles, Modifiers::NONE)).unwrap();
        assert!(matches!(
            last_call(&session),
            BackendCall::ReorderPages(r) if r.new_order == vec![2, 3, 1]
        ));
        // The selection follows the moved page.
        assert!(session.store().is_selected(3));
    }

    #[test]
    fn test_drag_with_partial_tiles() {
        let mut session = session(10);
        let tiles: Vec<PageTile> = (4..=6)
            .map(|page| {
                let x = (page - 4) as f64 * 100.0;
                PageTile {
                    page,
                    rect: Rect::new(x, 0.0, x + 80.0, 100.0),
                }
            })
            .collect();
        session.page_pointer_down(4, Point::new(40.0, 50.0));
        assert!(session.page_pointer_move(Point::new(150.0, 50.0)));
        block_on(session.page_pointer_up(Point::new(240.0, 50.0), &tiles, Modifiers::NONE)).unwrap();
        assert!(matches!(
            last_call(&session),
            BackendCall::ReorderPages(r) if r.new_order == vec![1, 2, 3, 5, 6, 4, 7, 8, 9, 10]
        ));
    }

    #[test]
    fn test_range_selection_pivots_on_moved_page() {
        let mut session = session(5);
        session.click_page(2, Modifiers::NONE);
        block_on(session.commit_reorder(&[1, 3, 4, 5, 2])).unwrap();
        session.click_page(3, Modifiers::shift());
        let selected: Vec<PageNumber> = session.store().selection().iter().copied().collect();
        assert_eq!(selected, vec![3, 4, 5]);

        assert!(block_on(session.undo()).unwrap());
        session.click_page(4, Modifiers::shift());
        let selected: Vec<PageNumber> = session.store().selection().iter().copied().collect();
        assert_eq!(selected, vec![2, 3, 4]);
    }

    #[test]
    fn test_merge_fetches_page_sizes() {
        init_logger();
        let backend = MemoryBackend::new()
            .with_pdf("a.pdf", vec![PageSize::A4])
            .with_pdf("b.pdf", vec![PageSize::LETTER, PageSize::LETTER]);
        let mut session = EditorSession::new(Arc::new(backend), EditorConfig::default());
        block_on(session.merge(vec![
            UploadFile::pdf("a.pdf", Vec::new()),
            UploadFile::pdf("b.pdf", Vec::new()),
        ]))
        .unwrap();
        let doc = session.store().document().unwrap();
        assert_eq!(doc.name, "merged.pdf");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[0].size, PageSize::A4);
        assert_eq!(doc.pages[2].size, PageSize::LETTER);
    }

    #[test]
    fn test_open_existing() {
        let mut session = session(2);
        let id = session.store().document_id().cloned().unwrap();
        session.store_mut().add_annotation(1, stroke()).unwrap();
        block_on(session.open_existing(id.clone())).unwrap();
        assert_eq!(session.store().document_id(), Some(&id));
        assert_eq!(session.store().annotation_count(), 0);
        assert_eq!(thumbnails(&session)[1], format!("/api/thumbnail/{}/2", id));
    }

    #[test]
    fn test_operations_without_document() {
        init_logger();
        let mut session = EditorSession::new(Arc::new(MemoryBackend::new()), EditorConfig::default());
        assert!(matches!(block_on(session.add_blank_page(1)), Err(EditorError::NoDocument)));
        assert!(matches!(block_on(session.export_annotations()), Err(EditorError::NoDocument)));
        assert!(session.backend().calls().is_empty());
    }

    #[test]
    fn test_upload_failure_reports_error() {
        init_logger();
        let backend = MemoryBackend::new();
        backend.fail_next(
            "upload",
            BackendError::Rejected {
                status: 413,
                detail: "File too large".to_string(),
            },
        );
        let mut session = EditorSession::new(Arc::new(backend), EditorConfig::default());
        assert!(block_on(session.upload(UploadFile::pdf("big.pdf", Vec::new()))).is_err());
        assert!(session.store().document().is_none());
        assert!(session.error_message().unwrap().contains("File too large"));
        assert!(!session.is_busy());
    }

    #[test]
    fn test_surface_round_trip() {
        let mut session = session(2);
        let mut surface = RecordingSurface::new();
        session.open_page(&mut surface, 2).unwrap();
        assert_eq!(session.open_page_size(), Some(PageSize::A4));
        session.store_mut().set_tool(ToolKind::Pen);
        let event = surface.finish_path(&[Point::new(1.0, 1.0), Point::new(9.0, 9.0)]);
        session.handle_surface_event(&mut surface, event).unwrap();
        assert_eq!(session.store().annotations_for(2).map(<[Annotation]>::len), Some(1));

        assert!(session.open_page(&mut surface, 7).is_err());
        assert!(session.error_message().is_some());
        session.close_page(&mut surface);
        assert_eq!(session.store().current_page(), None);
    }

    #[test]
    fn test_error_channel_dismissal() {
        let mut channel = ErrorChannel::new(Duration::from_secs(5));
        channel.show("first");
        channel.show("second");
        assert_eq!(channel.current(), Some("second"));
        assert!(!channel.tick());
        channel.dismiss();
        assert_eq!(channel.current(), None);

        let mut instant = ErrorChannel::new(Duration::ZERO);
        instant.show("gone");
        assert_eq!(instant.current(), None);
        assert!(instant.tick());
        assert!(!instant.tick());
    }
}
