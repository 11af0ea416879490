//! Drag-to-reorder controller for the page grid.
//!
//! A press on a page tile only becomes a drag once the pointer has travelled
//! past a threshold; shorter gestures are reported as clicks so the selection
//! controller can handle them.

use crate::document::PageNumber;
use kurbo::{Point, Rect};

/// Default pointer travel (in pixels) before a press turns into a drag.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 8.0;

/// Screen rectangle of a page tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTile {
    pub page: PageNumber,
    pub rect: Rect,
}

/// Current drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// Pointer is down on a tile but has not moved far enough.
    Pressed { page: PageNumber, origin: Point },
    /// Tile is being dragged.
    Dragging {
        page: PageNumber,
        origin: Point,
        current: Point,
    },
}

/// Result of releasing the pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// No gesture in progress.
    None,
    /// Released before the drag threshold: treat as a click on `page`.
    Click(PageNumber),
    /// Dropped onto the original position or outside any tile.
    Cancelled,
    /// Page `from` moves to position `to`.
    Reorder {
        from: PageNumber,
        to: PageNumber,
        /// `new_order[i]` is the old page number placed at position `i + 1`.
        new_order: Vec<PageNumber>,
    },
}

/// Drag state machine for page tiles.
#[derive(Debug, Clone)]
pub struct ReorderController {
    state: DragState,
    threshold: f64,
}

impl Default for ReorderController {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD)
    }
}

impl ReorderController {
    pub fn new(threshold: f64) -> Self {
        Self {
            state: DragState::Idle,
            threshold: threshold.max(0.0),
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The page being dragged, if a drag is in progress.
    pub fn dragged_page(&self) -> Option<PageNumber> {
        match self.state {
            DragState::Dragging { page, .. } => Some(page),
            DragState::Idle | DragState::Pressed { .. } => None,
        }
    }

    pub fn pointer_down(&mut self, page: PageNumber, position: Point) {
        self.state = DragState::Pressed {
            page,
            origin: position,
        };
    }

    /// Track pointer movement. Returns `true` when this move starts the drag.
    pub fn pointer_move(&mut self, position: Point) -> bool {
        match &mut self.state {
            DragState::Idle => false,
            DragState::Pressed { page, origin } => {
                if origin.distance(position) < self.threshold {
                    return false;
                }
                log::debug!("Started dragging page {}", page);
                self.state = DragState::Dragging {
                    page: *page,
                    origin: *origin,
                    current: position,
                };
                true
            }
            DragState::Dragging { current, .. } => {
                *current = position;
                false
            }
        }
    }

    /// Finish the gesture and resolve the drop target among `tiles`.
    ///
    /// `tiles` may cover only part of the document (e.g. the visible rows);
    /// the permutation always spans all `page_count` pages.
    pub fn pointer_up(
        &mut self,
        position: Point,
        tiles: &[PageTile],
        page_count: u32,
    ) -> DropOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DropOutcome::None,
            DragState::Pressed { page, .. } => DropOutcome::Click(page),
            DragState::Dragging { page, .. } => {
                let Some(target) = closest_center(position, tiles) else {
                    return DropOutcome::Cancelled;
                };
                if target == page || page > page_count || target > page_count {
                    return DropOutcome::Cancelled;
                }
                DropOutcome::Reorder {
                    from: page,
                    to: target,
                    new_order: move_permutation(page_count, page, target),
                }
            }
        }
    }

    /// Abort the gesture (e.g. on Escape or pointer capture loss).
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

/// The tile whose center is nearest to `point`.
pub fn closest_center(point: Point, tiles: &[PageTile]) -> Option<PageNumber> {
    tiles
        .iter()
        .map(|tile| (tile.page, tile.rect.center().distance(point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(page, _)| page)
}

/// Permutation that moves page `from` to position `to`, shifting the pages in
/// between by one.
pub fn move_permutation(page_count: u32, from: PageNumber, to: PageNumber) -> Vec<PageNumber> {
    let mut order: Vec<PageNumber> = (1..=page_count).collect();
    if from < 1 || from > page_count || to < 1 || to > page_count {
        return order;
    }
    let page = order.remove(from as usize - 1);
    order.insert(to as usize - 1, page);
    order
}
