//! Document and annotation state container.
//!
//! [`DocumentStore`] is the single source of truth for page order, per-page
//! annotations, the page selection and tool settings. Every other component
//! reads from it and writes through its mutation methods.

use crate::annotation::{Annotation, AnnotationId};
use crate::document::{Document, DocumentId, PageId, PageNumber, PageSize, Rotation, ThumbnailRef};
use crate::error::{EditorError, EditorResult};
use crate::history::{History, HistoryEntry, MAX_UNDO_HISTORY};
use crate::settings::{ToolKind, ToolSettings, ToolSettingsPatch};
use std::collections::{BTreeMap, BTreeSet};

/// Committed annotations keyed by page number. Pages without annotations have
/// no entry.
pub type AnnotationMap = BTreeMap<PageNumber, Vec<Annotation>>;

/// Committed annotations keyed by stable page id, as kept in history.
pub type PageAnnotations = BTreeMap<PageId, Vec<Annotation>>;

/// Prior state captured by an undoable action.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoState {
    /// Page order (stable ids, display order) before a reorder.
    Reorder(Vec<PageId>),
    /// Full annotation mapping before an annotation change, keyed by page id
    /// so it survives later renumbering.
    AnnotationChange(PageAnnotations),
}

/// Kind of an [`UndoState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Reorder,
    AnnotationChange,
}

impl UndoState {
    pub fn kind(&self) -> UndoKind {
        match self {
            UndoState::Reorder(_) => UndoKind::Reorder,
            UndoState::AnnotationChange(_) => UndoKind::AnnotationChange,
        }
    }
}

/// An undoable action as stored in history.
pub type UndoAction = HistoryEntry<UndoState>;

/// State container for one editing session.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    document: Option<Document>,
    annotations: AnnotationMap,
    selection: BTreeSet<PageNumber>,
    open_page: Option<PageNumber>,
    tool: ToolKind,
    settings: ToolSettings,
    history: History<UndoState>,
    annotation_revision: u64,
    tool_revision: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl DocumentStore {
    /// Create an empty store keeping at most `history_limit` undo entries.
    pub fn new(history_limit: usize) -> Self {
        Self {
            document: None,
            annotations: AnnotationMap::new(),
            selection: BTreeSet::new(),
            open_page: None,
            tool: ToolKind::default(),
            settings: ToolSettings::default(),
            history: History::new(history_limit),
            annotation_revision: 0,
            tool_revision: 0,
        }
    }

    // --- Document lifecycle ---

    /// Replace the document and reset all derived state.
    ///
    /// This is the only operation that discards undo history.
    pub fn load_document(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
        page_count: u32,
        sizes: &[PageSize],
        thumbnails: &[ThumbnailRef],
    ) {
        let document = Document::new(id, name, page_count, sizes, thumbnails);
        log::info!(
            "Loaded document {} ({} pages)",
            document.id,
            document.page_count()
        );
        self.document = Some(document);
        self.reset_session_state();
    }

    /// Tear down the current document.
    pub fn close_document(&mut self) {
        if let Some(doc) = self.document.take() {
            log::info!("Closed document {}", doc.id);
        }
        self.reset_session_state();
    }

    fn reset_session_state(&mut self) {
        self.annotations.clear();
        self.selection.clear();
        self.open_page = None;
        self.history.clear();
        self.annotation_revision += 1;
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_id(&self) -> Option<&DocumentId> {
        self.document.as_ref().map(|d| &d.id)
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, Document::page_count)
    }

    fn require_document(&self) -> EditorResult<&Document> {
        self.document.as_ref().ok_or(EditorError::NoDocument)
    }

    fn require_page(&self, page: PageNumber) -> EditorResult<&Document> {
        let doc = self.require_document()?;
        doc.check_page(page)?;
        Ok(doc)
    }

    // --- Selection ---

    pub fn selection(&self) -> &BTreeSet<PageNumber> {
        &self.selection
    }

    pub fn is_selected(&self, page: PageNumber) -> bool {
        self.selection.contains(&page)
    }

    /// Add or remove `page` from the selection. Out-of-range pages are ignored.
    pub fn toggle_page_selection(&mut self, page: PageNumber) {
        if self.require_page(page).is_err() {
            log::debug!("Ignoring selection toggle for missing page {}", page);
            return;
        }
        if !self.selection.remove(&page) {
            self.selection.insert(page);
        }
    }

    /// Replace the selection with a single page.
    pub fn select_only(&mut self, page: PageNumber) {
        self.selection.clear();
        if self.require_page(page).is_ok() {
            self.selection.insert(page);
        }
    }

    /// Replace the selection with `min(a, b)..=max(a, b)`, clamped to the document.
    pub fn select_range(&mut self, a: PageNumber, b: PageNumber) {
        let (lo, hi) = (a.min(b).max(1), a.max(b).min(self.page_count()));
        self.selection = (lo..=hi).collect();
    }

    pub fn select_all(&mut self) {
        self.selection = (1..=self.page_count()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- Pages ---

    /// Reorder pages. `new_order[i]` is the old page number that moves to
    /// position `i + 1`.
    ///
    /// Annotations, the selection and the open page follow their pages.
    /// Returns `Ok(false)` for the identity permutation (nothing recorded).
    pub fn reorder_pages(&mut self, new_order: &[PageNumber]) -> EditorResult<bool> {
        let doc = self.require_document()?;
        doc.check_permutation(new_order)?;
        if new_order.iter().enumerate().all(|(i, &n)| n as usize == i + 1) {
            return Ok(false);
        }
        let previous = doc.order();
        self.history
            .record(UndoState::Reorder(previous), "Reorder pages");
        self.apply_order(new_order);
        log::debug!("Reordered pages: {:?}", new_order);
        Ok(true)
    }

    /// Apply a validated permutation to pages, annotations and selection.
    fn apply_order(&mut self, new_order: &[PageNumber]) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let mut slots: Vec<_> = std::mem::take(&mut doc.pages)
            .into_iter()
            .map(Some)
            .collect();
        doc.pages = new_order
            .iter()
            .filter_map(|&old| slots.get_mut(old as usize - 1).and_then(Option::take))
            .collect();
        doc.renumber();

        let mut new_number = vec![0; new_order.len() + 1];
        for (i, &old) in new_order.iter().enumerate() {
            new_number[old as usize] = i as PageNumber + 1;
        }
        self.remap_pages(|old| new_number.get(old as usize).copied().filter(|&n| n > 0));
    }

    /// Move annotations, selection and open page to new page numbers.
    /// Pages mapped to `None` lose their annotations.
    fn remap_pages(&mut self, mapping: impl Fn(PageNumber) -> Option<PageNumber>) {
        self.annotations = remap_annotations(std::mem::take(&mut self.annotations), &mapping);
        self.selection = self.selection.iter().filter_map(|&p| mapping(p)).collect();
        self.open_page = self.open_page.and_then(&mapping);
        self.annotation_revision += 1;
    }

    /// Put pages back into a recorded order. Returns the order that was replaced.
    fn restore_order(&mut self, order: Vec<PageId>) -> Vec<PageId> {
        let Some(doc) = self.document.as_ref() else {
            return order;
        };
        let current = doc.order();
        let new_order: Option<Vec<PageNumber>> =
            order.iter().map(|&id| doc.number_of(id)).collect();
        match new_order {
            Some(new_order) if doc.check_permutation(&new_order).is_ok() => {
                self.apply_order(&new_order);
            }
            _ => log::warn!("Recorded page order no longer matches the document; skipped"),
        }
        current
    }

    /// Positional thumbnail replacement after a backend round trip.
    pub fn update_thumbnails(&mut self, refs: &[ThumbnailRef]) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        for (page, thumbnail) in doc.pages.iter_mut().zip(refs) {
            page.thumbnail = thumbnail.clone();
        }
    }

    /// Set a page's rotation locally, ahead of the backend.
    pub fn set_page_rotation(&mut self, page: PageNumber, rotation: Rotation) -> EditorResult<()> {
        self.require_page(page)?;
        if let Some(p) = self.document.as_mut().and_then(|d| d.page_mut(page)) {
            p.rotation = rotation;
        }
        Ok(())
    }

    /// Drop pages the backend removed, shifting later pages down.
    ///
    /// Annotations on removed pages are dropped. History snapshots are
    /// renumbered rather than discarded. Not undoable.
    pub fn apply_page_removal(&mut self, removed: &[PageNumber]) -> EditorResult<()> {
        let doc = self.require_document()?;
        for &page in removed {
            doc.check_page(page)?;
        }
        let removed: BTreeSet<PageNumber> = removed.iter().copied().collect();
        if removed.is_empty() {
            return Err(EditorError::EmptyPageSelection);
        }
        if removed.len() as u32 >= doc.page_count() {
            return Err(EditorError::CannotDeleteAllPages);
        }

        let mut new_number = vec![0; doc.page_count() as usize + 1];
        let mut next = 1;
        for page in 1..=doc.page_count() {
            if !removed.contains(&page) {
                new_number[page as usize] = next;
                next += 1;
            }
        }
        let removed_ids: BTreeSet<PageId> = doc
            .pages
            .iter()
            .filter(|p| removed.contains(&p.number))
            .map(|p| p.id)
            .collect();

        if let Some(doc) = self.document.as_mut() {
            doc.pages.retain(|p| !removed_ids.contains(&p.id));
            doc.renumber();
        }
        let mapping = |old: PageNumber| new_number.get(old as usize).copied().filter(|&n| n > 0);
        self.remap_pages(mapping);
        self.history.map_steps(|step| match step {
            UndoState::Reorder(order) => order.retain(|id| !removed_ids.contains(id)),
            UndoState::AnnotationChange(map) => map.retain(|id, _| !removed_ids.contains(id)),
        });
        log::debug!("Removed pages {:?}", removed);
        Ok(())
    }

    /// Insert a new page so that it becomes page `position`.
    ///
    /// Later pages shift up by one. History snapshots are renumbered. Not
    /// undoable. Returns the new page's id.
    pub fn apply_page_insertion(
        &mut self,
        position: PageNumber,
        size: PageSize,
        thumbnail: ThumbnailRef,
    ) -> EditorResult<PageId> {
        let doc = self.require_document()?;
        if position < 1 || position > doc.page_count() + 1 {
            return Err(EditorError::PageOutOfRange {
                page: position,
                page_count: doc.page_count(),
            });
        }
        let page = crate::document::Page::new(position, size, thumbnail);
        let id = page.id;
        if let Some(doc) = self.document.as_mut() {
            doc.pages.insert(position as usize - 1, page);
            doc.renumber();
        }
        let mapping = |old: PageNumber| Some(if old < position { old } else { old + 1 });
        self.remap_pages(mapping);
        self.history.map_steps(|step| {
            if let UndoState::Reorder(order) = step {
                let at = (position as usize - 1).min(order.len());
                order.insert(at, id);
            }
        });
        log::debug!("Inserted page at {}", position);
        Ok(id)
    }

    // --- Open page ---

    /// Choose the page shown on the live annotation surface.
    pub fn open_page(&mut self, page: PageNumber) -> EditorResult<()> {
        self.require_page(page)?;
        self.open_page = Some(page);
        Ok(())
    }

    pub fn close_page(&mut self) {
        self.open_page = None;
    }

    pub fn current_page(&self) -> Option<PageNumber> {
        self.open_page
    }

    // --- Annotations ---

    pub fn annotations(&self) -> &AnnotationMap {
        &self.annotations
    }

    /// Committed annotations of `page`, or `None` if it has none.
    pub fn annotations_for(&self, page: PageNumber) -> Option<&[Annotation]> {
        self.annotations.get(&page).map(Vec::as_slice)
    }

    pub fn find_annotation(&self, page: PageNumber, id: AnnotationId) -> Option<&Annotation> {
        self.annotations_for(page)?.iter().find(|a| a.id() == id)
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    /// Bumped on every change to the annotation mapping.
    pub fn annotation_revision(&self) -> u64 {
        self.annotation_revision
    }

    fn record_annotations(&mut self, description: &str) {
        let snapshot = self.annotations_by_id();
        self.history
            .record(UndoState::AnnotationChange(snapshot), description);
    }

    fn annotations_by_id(&self) -> PageAnnotations {
        let Some(doc) = self.document.as_ref() else {
            return PageAnnotations::new();
        };
        self.annotations
            .iter()
            .filter_map(|(&page, list)| doc.page(page).map(|p| (p.id, list.clone())))
            .collect()
    }

    fn annotations_by_number(&self, map: PageAnnotations) -> AnnotationMap {
        let Some(doc) = self.document.as_ref() else {
            return AnnotationMap::new();
        };
        map.into_iter()
            .filter_map(|(id, list)| doc.number_of(id).map(|n| (n, list)))
            .collect()
    }

    pub fn add_annotation(&mut self, page: PageNumber, annotation: Annotation) -> EditorResult<()> {
        self.require_page(page)?;
        self.record_annotations("Add annotation");
        log::debug!("Adding annotation {} to page {}", annotation.id(), page);
        self.annotations.entry(page).or_default().push(annotation);
        self.annotation_revision += 1;
        Ok(())
    }

    /// Remove one annotation. Returns `false` (and records nothing) if absent.
    pub fn remove_annotation(&mut self, page: PageNumber, id: AnnotationId) -> bool {
        if self.find_annotation(page, id).is_none() {
            return false;
        }
        self.record_annotations("Remove annotation");
        if let Some(list) = self.annotations.get_mut(&page) {
            list.retain(|a| a.id() != id);
            if list.is_empty() {
                self.annotations.remove(&page);
            }
        }
        self.annotation_revision += 1;
        log::debug!("Removed annotation {} from page {}", id, page);
        true
    }

    /// Remove every annotation on `page`. No-op on an empty page.
    pub fn clear_page_annotations(&mut self, page: PageNumber) -> bool {
        if !self.annotations.contains_key(&page) {
            return false;
        }
        self.record_annotations("Clear page annotations");
        self.annotations.remove(&page);
        self.annotation_revision += 1;
        true
    }

    /// Remove every annotation in the document. No-op if there are none.
    pub fn clear_all_annotations(&mut self) -> bool {
        if self.annotations.is_empty() {
            return false;
        }
        self.record_annotations("Clear all annotations");
        self.annotations.clear();
        self.annotation_revision += 1;
        true
    }

    /// Replace an annotation with a new version as a single undo unit.
    ///
    /// Returns `Ok(false)` if `old_id` is not on `page`.
    pub fn replace_annotation(
        &mut self,
        page: PageNumber,
        old_id: AnnotationId,
        annotation: Annotation,
    ) -> EditorResult<bool> {
        self.require_page(page)?;
        if self.find_annotation(page, old_id).is_none() {
            return Ok(false);
        }
        self.history.begin_group("Edit annotation");
        self.remove_annotation(page, old_id);
        let added = self.add_annotation(page, annotation);
        self.history.end_group();
        added.map(|()| true)
    }

    /// Collect the following undoable actions into one history entry until
    /// [`end_group`](Self::end_group).
    pub fn begin_group(&mut self, description: &str) {
        self.history.begin_group(description);
    }

    pub fn end_group(&mut self) -> bool {
        self.history.end_group()
    }

    // --- Tools ---

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
        self.tool_revision += 1;
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, patch: ToolSettingsPatch) {
        self.settings.merge(patch);
        self.tool_revision += 1;
    }

    /// Bumped on every tool switch and settings change.
    pub fn tool_revision(&self) -> u64 {
        self.tool_revision
    }

    // --- History ---

    pub fn history(&self) -> &History<UndoState> {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Undo the last action. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.take_undo() else {
            return false;
        };
        log::debug!("Undo: {}", entry.description);
        let inverse = self.apply_entry(entry);
        self.history.push_redo(inverse);
        true
    }

    /// Redo the last undone action. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.take_redo() else {
            return false;
        };
        log::debug!("Redo: {}", entry.description);
        let inverse = self.apply_entry(entry);
        self.history.push_undo(inverse);
        true
    }

    /// Revert the last action without making it redoable.
    ///
    /// Redo entries and old undo entries the action displaced come back.
    pub fn revert_last(&mut self) -> bool {
        let Some(entry) = self.history.retract() else {
            return false;
        };
        log::debug!("Reverting: {}", entry.description);
        self.apply_entry(entry);
        true
    }

    /// Swap every step of `entry` with the current state, last step first.
    /// Returns the entry that reverses what was just applied.
    fn apply_entry(&mut self, entry: UndoAction) -> UndoAction {
        let steps = entry
            .steps
            .into_iter()
            .rev()
            .map(|step| self.swap_state(step))
            .collect();
        HistoryEntry {
            steps,
            description: entry.description,
        }
    }

    fn swap_state(&mut self, state: UndoState) -> UndoState {
        match state {
            UndoState::AnnotationChange(map) => {
                let current = self.annotations_by_id();
                self.annotations = self.annotations_by_number(map);
                self.annotation_revision += 1;
                UndoState::AnnotationChange(current)
            }
            UndoState::Reorder(order) => UndoState::Reorder(self.restore_order(order)),
        }
    }
}

fn remap_annotations(
    map: AnnotationMap,
    mapping: &impl Fn(PageNumber) -> Option<PageNumber>,
) -> AnnotationMap {
    map.into_iter()
        .filter_map(|(page, list)| mapping(page).map(|n| (n, list)))
        .collect()
}
