//! In-memory drawing surface.
//!
//! Stands in for the browser canvas in headless use and tests: it keeps the
//! drawables it is given, hit-tests them and produces the events a real
//! surface would emit for pointer gestures.

use super::{
    polyline, Drawable, DrawableContent, DrawableHandle, DrawableTag, DrawingSurface,
    InteractionMode, SurfaceEvent,
};
use crate::annotation::AnnotationId;
use crate::document::{PageNumber, PageSize, ThumbnailRef};
use crate::settings::Brush;
use kurbo::Point;
use std::collections::BTreeMap;

/// Pointer slop used for hit testing, in page units.
const HIT_TOLERANCE: f64 = 4.0;

#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    background: Option<(PageNumber, ThumbnailRef, PageSize)>,
    drawables: BTreeMap<DrawableHandle, Drawable>,
    next_handle: DrawableHandle,
    mode: InteractionMode,
    brush: Option<Brush>,
    editing: Option<DrawableHandle>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(&self) -> Option<(PageNumber, &ThumbnailRef, PageSize)> {
        self.background
            .as_ref()
            .map(|(page, raster, size)| (*page, raster, *size))
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn brush(&self) -> Option<Brush> {
        self.brush
    }

    /// Drawable currently in text edit mode.
    pub fn editing(&self) -> Option<DrawableHandle> {
        self.editing
    }

    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    /// Drawables in stacking order, bottom first.
    pub fn drawables(&self) -> impl Iterator<Item = (DrawableHandle, &Drawable)> {
        self.drawables.iter().map(|(h, d)| (*h, d))
    }

    pub fn committed_handles(&self) -> Vec<DrawableHandle> {
        self.drawables()
            .filter(|(_, d)| d.tag.committed_id().is_some())
            .map(|(h, _)| h)
            .collect()
    }

    pub fn committed_ids(&self) -> Vec<AnnotationId> {
        self.drawables()
            .filter_map(|(_, d)| d.tag.committed_id())
            .collect()
    }

    pub fn provisional_handle(&self) -> Option<DrawableHandle> {
        self.drawables()
            .find(|(_, d)| d.tag.is_provisional())
            .map(|(h, _)| h)
    }

    /// Topmost drawable under `point`.
    pub fn hit(&self, point: Point) -> Option<DrawableHandle> {
        self.drawables
            .iter()
            .rev()
            .find(|(_, d)| d.content.hit_test(point, HIT_TOLERANCE))
            .map(|(h, _)| *h)
    }

    /// Simulate a free-draw gesture through `points` with the installed brush.
    pub fn finish_path(&mut self, points: &[Point]) -> SurfaceEvent {
        let path = polyline(points);
        let brush = self.brush.unwrap_or(Brush {
            color: peniko::Color::BLACK,
            width: 1.0,
        });
        let handle = self.add_drawable(Drawable {
            tag: DrawableTag::Ephemeral,
            content: DrawableContent::Path {
                path: path.clone(),
                brush,
            },
        });
        SurfaceEvent::PathFinished { handle, path }
    }

    pub fn click(&self, position: Point) -> SurfaceEvent {
        SurfaceEvent::Click {
            position,
            target: self.hit(position),
        }
    }

    pub fn eraser_down(&self, position: Point) -> SurfaceEvent {
        SurfaceEvent::EraserDown {
            target: self.hit(position),
        }
    }
}

impl DrawingSurface for RecordingSurface {
    fn set_background(&mut self, page: PageNumber, raster: &ThumbnailRef, size: PageSize) {
        self.background = Some((page, raster.clone(), size));
    }

    fn add_drawable(&mut self, drawable: Drawable) -> DrawableHandle {
        self.next_handle += 1;
        self.drawables.insert(self.next_handle, drawable);
        self.next_handle
    }

    fn remove_drawable(&mut self, handle: DrawableHandle) {
        self.drawables.remove(&handle);
        if self.editing == Some(handle) {
            self.editing = None;
        }
    }

    fn clear_drawables(&mut self) {
        self.drawables.clear();
        self.editing = None;
    }

    fn drawable(&self, handle: DrawableHandle) -> Option<&Drawable> {
        self.drawables.get(&handle)
    }

    fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    fn set_brush(&mut self, brush: Option<Brush>) {
        self.brush = brush;
    }

    fn begin_text_editing(&mut self, handle: DrawableHandle) {
        if self.drawables.contains_key(&handle) {
            self.editing = Some(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_after_clear() {
        let mut surface = RecordingSurface::new();
        let SurfaceEvent::PathFinished { handle: first, .. } =
            surface.finish_path(&[Point::ZERO, Point::new(1.0, 1.0)])
        else {
            panic!("expected path event");
        };
        surface.clear_drawables();
        let SurfaceEvent::PathFinished { handle: second, .. } =
            surface.finish_path(&[Point::ZERO, Point::new(1.0, 1.0)])
        else {
            panic!("expected path event");
        };
        assert_ne!(first, second);
        assert_eq!(surface.drawable_count(), 1);
    }

    #[test]
    fn test_hit_prefers_topmost() {
        let mut surface = RecordingSurface::new();
        let points = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        surface.finish_path(&points);
        let SurfaceEvent::PathFinished { handle: top, .. } = surface.finish_path(&points) else {
            panic!("expected path event");
        };
        assert_eq!(surface.hit(Point::new(50.0, 2.0)), Some(top));
        assert_eq!(surface.hit(Point::new(50.0, 40.0)), None);
    }

    #[test]
    fn test_editing_cleared_with_drawable() {
        let mut surface = RecordingSurface::new();
        let SurfaceEvent::PathFinished { handle, .. } = surface.finish_path(&[Point::ZERO]) else {
            panic!("expected path event");
        };
        surface.begin_text_editing(handle);
        assert_eq!(surface.editing(), Some(handle));
        surface.remove_drawable(handle);
        assert_eq!(surface.editing(), None);
        surface.begin_text_editing(handle);
        assert_eq!(surface.editing(), None);
    }
}
