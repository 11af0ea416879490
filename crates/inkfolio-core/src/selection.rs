//! Page selection controller.
//!
//! Translates clicks and key presses on the page grid into selection updates
//! on the [`DocumentStore`]. The only state kept here is the anchor page used
//! for range selection and keyboard navigation. The anchor is held by page id,
//! so it stays on the same page through reorders and undo.

use crate::document::{PageId, PageNumber};
use crate::input::{Modifiers, NavKey};
use crate::store::DocumentStore;

/// How a click is interpreted, resolved from modifiers before any state is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Select only the clicked page.
    Replace,
    /// Add or remove the clicked page.
    Toggle,
    /// Select the range from the anchor to the clicked page.
    Range,
}

impl ClickMode {
    /// Shift takes precedence over the command modifier.
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        match (modifiers.shift, modifiers.command()) {
            (true, _) => ClickMode::Range,
            (false, true) => ClickMode::Toggle,
            (false, false) => ClickMode::Replace,
        }
    }
}

/// Selection state machine over the anchor page.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    anchor: Option<PageId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of the anchor page. `None` once that page is removed.
    pub fn anchor(&self, store: &DocumentStore) -> Option<PageNumber> {
        let id = self.anchor?;
        store.document()?.number_of(id)
    }

    fn set_anchor(&mut self, store: &DocumentStore, page: PageNumber) {
        self.anchor = store.document().and_then(|d| d.page(page)).map(|p| p.id);
    }

    /// Forget the anchor (on document load).
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Handle a click on `page`.
    pub fn click(&mut self, store: &mut DocumentStore, page: PageNumber, modifiers: Modifiers) {
        if page < 1 || page > store.page_count() {
            return;
        }
        match (ClickMode::from_modifiers(modifiers), self.anchor(store)) {
            (ClickMode::Range, Some(anchor)) => {
                // The anchor stays put so consecutive shift-clicks pivot around it.
                store.select_range(anchor, page);
            }
            (ClickMode::Toggle, _) => {
                store.toggle_page_selection(page);
                self.set_anchor(store, page);
            }
            (ClickMode::Replace, _) | (ClickMode::Range, None) => {
                store.select_only(page);
                self.set_anchor(store, page);
            }
        }
    }

    /// Handle a key press. Returns `true` if the key was consumed.
    pub fn key(&mut self, store: &mut DocumentStore, key: NavKey, modifiers: Modifiers) -> bool {
        let page_count = store.page_count();
        if page_count == 0 {
            return false;
        }
        match key {
            NavKey::Escape => {
                store.clear_selection();
                self.anchor = None;
                true
            }
            NavKey::A if modifiers.command() => {
                store.select_all();
                true
            }
            NavKey::A => false,
            NavKey::Home => {
                self.move_to(store, 1, modifiers.shift);
                true
            }
            NavKey::End => {
                self.move_to(store, page_count, modifiers.shift);
                true
            }
            NavKey::Left | NavKey::Right | NavKey::Up | NavKey::Down => {
                let Some(step) = key.step() else {
                    return false;
                };
                let target = match self.anchor(store) {
                    Some(anchor) => (anchor as i64 + step).clamp(1, page_count as i64) as PageNumber,
                    None => 1,
                };
                self.move_to(store, target, modifiers.shift);
                true
            }
        }
    }

    fn move_to(&mut self, store: &mut DocumentStore, target: PageNumber, extend: bool) {
        if extend {
            if self.anchor(store) == Some(target) {
                return;
            }
            store.toggle_page_selection(target);
        } else {
            store.select_only(target);
        }
        self.set_anchor(store, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;

    fn store(count: u32) -> DocumentStore {
        let mut store = DocumentStore::default();
        store.load_document(DocumentId::new("doc"), "t.pdf", count, &[], &[]);
        store
    }

    fn selected(store: &DocumentStore) -> Vec<PageNumber> {
        store.selection().iter().copied().collect()
    }

    #[test]
    fn test_plain_click_replaces() {
        let mut store = store(5);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 2, Modifiers::NONE);
        sel.click(&mut store, 4, Modifiers::NONE);
        assert_eq!(selected(&store), vec![4]);
        assert_eq!(sel.anchor(&store), Some(4));
    }

    #[test]
    fn test_toggle_click() {
        let mut store = store(5);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 2, Modifiers::ctrl());
        sel.click(&mut store, 4, Modifiers::ctrl());
        assert_eq!(selected(&store), vec![2, 4]);
        sel.click(&mut store, 2, Modifiers::ctrl());
        assert_eq!(selected(&store), vec![4]);
        assert_eq!(sel.anchor(&store), Some(2));
    }

    #[test]
    fn test_shift_click_replaces_with_range() {
        let mut store = store(6);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 5, Modifiers::NONE);
        sel.click(&mut store, 1, Modifiers::ctrl());
        sel.click(&mut store, 3, Modifiers::shift());
        assert_eq!(selected(&store), vec![1, 2, 3]);
        sel.click(&mut store, 6, Modifiers::shift());
        assert_eq!(selected(&store), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_shift_click_without_anchor() {
        let mut store = store(3);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 2, Modifiers::shift());
        assert_eq!(selected(&store), vec![2]);
    }

    #[test]
    fn test_modifier_precedence_is_fixed() {
        let both = Modifiers {
            shift: true,
            ctrl: true,
            ..Modifiers::NONE
        };
        assert_eq!(ClickMode::from_modifiers(both), ClickMode::Range);
        let mut store = store(5);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 1, Modifiers::NONE);
        sel.click(&mut store, 3, both);
        assert_eq!(selected(&store), vec![1, 2, 3]);
    }

    #[test]
    fn test_arrow_navigation_clamps() {
        let mut store = store(3);
        let mut sel = SelectionController::new();
        assert!(sel.key(&mut store, NavKey::Right, Modifiers::NONE));
        assert_eq!(selected(&store), vec![1]);
        sel.key(&mut store, NavKey::Right, Modifiers::NONE);
        sel.key(&mut store, NavKey::Down, Modifiers::NONE);
        sel.key(&mut store, NavKey::Right, Modifiers::NONE);
        assert_eq!(selected(&store), vec![3]);
        sel.key(&mut store, NavKey::Left, Modifiers::NONE);
        sel.key(&mut store, NavKey::Up, Modifiers::NONE);
        sel.key(&mut store, NavKey::Up, Modifiers::NONE);
        assert_eq!(selected(&store), vec![1]);
    }

    #[test]
    fn test_shift_arrow_extends() {
        let mut store = store(5);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 2, Modifiers::NONE);
        sel.key(&mut store, NavKey::Right, Modifiers::shift());
        sel.key(&mut store, NavKey::Right, Modifiers::shift());
        assert_eq!(selected(&store), vec![2, 3, 4]);

        sel.click(&mut store, 5, Modifiers::ctrl());
        sel.key(&mut store, NavKey::Right, Modifiers::shift());
        assert_eq!(selected(&store), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_escape_and_select_all() {
        let mut store = store(4);
        let mut sel = SelectionController::new();
        assert!(sel.key(&mut store, NavKey::A, Modifiers::ctrl()));
        assert_eq!(selected(&store), vec![1, 2, 3, 4]);
        assert!(!sel.key(&mut store, NavKey::A, Modifiers::NONE));
        sel.key(&mut store, NavKey::Escape, Modifiers::NONE);
        assert!(selected(&store).is_empty());
        assert_eq!(sel.anchor(&store), None);
    }

    #[test]
    fn test_anchor_follows_reordered_page() {
        let mut store = store(5);
        let mut sel = SelectionController::new();
        sel.click(&mut store, 2, Modifiers::NONE);
        store.reorder_pages(&[2, 1, 3, 4, 5]).expect("reorder");
        assert_eq!(sel.anchor(&store), Some(1));

        sel.click(&mut store, 3, Modifiers::shift());
        assert_eq!(selected(&store), vec![1, 2, 3]);
        sel.key(&mut store, NavKey::Right, Modifiers::NONE);
        assert_eq!(selected(&store), vec![2]);

        store.undo();
        assert_eq!(sel.anchor(&store), Some(1));
        store.apply_page_removal(&[1]).expect("remove");
        assert_eq!(sel.anchor(&store), None);
    }

    #[test]
    fn test_home_end() {
        let mut store = store(4);
        let mut sel = SelectionController::new();
        sel.key(&mut store, NavKey::End, Modifiers::NONE);
        assert_eq!(selected(&store), vec![4]);
        sel.key(&mut store, NavKey::Home, Modifiers::NONE);
        assert_eq!(selected(&store), vec![1]);
    }
}
