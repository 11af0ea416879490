//! Live drawing surface abstraction and its synchronization with the store.
//!
//! The interactive surface (a 2D canvas library in the browser) is reached
//! through the [`DrawingSurface`] trait. It is always a disposable projection
//! of the committed annotations of the open page; [`CanvasSync`] keeps it
//! that way and hosts the in-progress edits that must not reach the store
//! early.

mod recording;
mod sync;

pub use recording::RecordingSurface;
pub use sync::{drawable_for, CanvasSync};

use crate::annotation::{point_to_polyline_dist, AnnotationId};
use crate::document::{PageNumber, PageSize, ThumbnailRef};
use crate::settings::{Brush, TextStyle};
use kurbo::{BezPath, PathEl, Point, Rect, Shape, Vec2};

/// Surface-assigned handle of a drawable object.
pub type DrawableHandle = u64;

/// How the surface reacts to pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// Plain pointer events (text placement, eraser).
    #[default]
    Default,
    /// Objects can be selected, moved and edited.
    Manipulate,
    /// Pointer drags draw paths with the installed brush.
    FreeDraw,
}

/// Bookkeeping attached to every drawable.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawableTag {
    /// Projection of a committed annotation.
    Committed(AnnotationId),
    /// Text box being typed that is not in the store yet.
    Provisional { id: AnnotationId, style: TextStyle },
    /// Freshly drawn path the surface created on its own.
    Ephemeral,
}

impl DrawableTag {
    /// Id of the committed annotation, if this drawable shows one.
    pub fn committed_id(&self) -> Option<AnnotationId> {
        match self {
            DrawableTag::Committed(id) => Some(*id),
            DrawableTag::Provisional { .. } | DrawableTag::Ephemeral => None,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, DrawableTag::Provisional { .. })
    }
}

/// What a drawable shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawableContent {
    Path { path: BezPath, brush: Brush },
    Text {
        text: String,
        position: Point,
        style: TextStyle,
    },
}

impl DrawableContent {
    pub fn bounds(&self) -> Rect {
        match self {
            DrawableContent::Path { path, brush } => {
                let half = brush.width / 2.0;
                path.bounding_box().inflate(half, half)
            }
            DrawableContent::Text {
                text,
                position,
                style,
            } => {
                let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                let lines = text.lines().count().max(1);
                let width = (widest as f64 * style.font_size * 0.55).max(20.0);
                Rect::from_origin_size(*position, (width, lines as f64 * style.font_size * 1.2))
            }
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            DrawableContent::Path { path, brush } => {
                let points = path_points(path);
                let reach = tolerance + brush.width / 2.0;
                match points.as_slice() {
                    [] => false,
                    [only] => only.distance(point) <= reach,
                    points => point_to_polyline_dist(point, points) <= reach,
                }
            }
            DrawableContent::Text { .. } => {
                self.bounds().inflate(tolerance, tolerance).contains(point)
            }
        }
    }
}

/// An object on the live surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub tag: DrawableTag,
    pub content: DrawableContent,
}

/// Events reported by the live surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Pointer-up after free drawing. The surface already added the path as
    /// an [`DrawableTag::Ephemeral`] drawable under `handle`.
    PathFinished { handle: DrawableHandle, path: BezPath },
    /// Click outside free-draw mode; `target` is the topmost drawable hit.
    Click {
        position: Point,
        target: Option<DrawableHandle>,
    },
    /// Text content changed while editing.
    TextInput { handle: DrawableHandle, text: String },
    /// Text editing ended (blur or explicit exit) with the final content.
    TextEditEnded { handle: DrawableHandle, text: String },
    /// An object was dragged in manipulation mode.
    ObjectMoved { handle: DrawableHandle, offset: Vec2 },
    /// Pointer-down in eraser mode.
    EraserDown { target: Option<DrawableHandle> },
}

/// The interactive drawing/editing surface.
pub trait DrawingSurface {
    /// Show the page raster behind all drawables.
    fn set_background(&mut self, page: PageNumber, raster: &ThumbnailRef, size: PageSize);

    fn add_drawable(&mut self, drawable: Drawable) -> DrawableHandle;

    fn remove_drawable(&mut self, handle: DrawableHandle);

    /// Remove every drawable, keeping the background.
    fn clear_drawables(&mut self);

    fn drawable(&self, handle: DrawableHandle) -> Option<&Drawable>;

    fn set_mode(&mut self, mode: InteractionMode);

    /// Install (or remove) the free-draw brush.
    fn set_brush(&mut self, brush: Option<Brush>);

    /// Put a text drawable into live edit mode.
    fn begin_text_editing(&mut self, handle: DrawableHandle);
}

/// Points of a path in order. Curve elements contribute their control points
/// and end point; close-path contributes nothing.
pub fn path_points(path: &BezPath) -> Vec<Point> {
    let mut points = Vec::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => points.push(p),
            PathEl::QuadTo(c, p) => points.extend([c, p]),
            PathEl::CurveTo(c1, c2, p) => points.extend([c1, c2, p]),
            PathEl::ClosePath => {}
        }
    }
    points
}

/// Polyline path through `points`.
pub fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_points_from_commands() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.quad_to((1.0, 1.0), (2.0, 0.0));
        path.curve_to((3.0, 1.0), (4.0, 1.0), (5.0, 0.0));
        path.line_to((6.0, 0.0));
        path.close_path();
        let points = path_points(&path);
        assert_eq!(points.len(), 7);
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(points[1], Point::new(1.0, 1.0));
        assert_eq!(points[6], Point::new(6.0, 0.0));
    }

    #[test]
    fn test_single_click_path_has_one_point() {
        let mut path = BezPath::new();
        path.move_to((3.0, 3.0));
        assert_eq!(path_points(&path).len(), 1);
        assert!(path_points(&BezPath::new()).is_empty());
    }

    #[test]
    fn test_polyline_round_trip() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 2.0), Point::new(3.0, 4.0)];
        assert_eq!(path_points(&polyline(&points)), points);
    }

    #[test]
    fn test_tag_committed_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(DrawableTag::Committed(id).committed_id(), Some(id));
        assert_eq!(DrawableTag::Ephemeral.committed_id(), None);
    }
}
