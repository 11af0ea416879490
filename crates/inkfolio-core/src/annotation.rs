//! Annotation definitions for page markup.
//!
//! An annotation is a single mark on a page: either a freehand stroke (pen or
//! highlighter) or a text box. Annotations are plain values; the page they
//! belong to is the key they are stored under in the
//! [`DocumentStore`](crate::store::DocumentStore).

use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for annotations.
pub type AnnotationId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn yellow() -> Self {
        Self::new(255, 255, 0, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Returns `None` for anything else.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])? * 17;
                let g = channel(&hex[1..2])? * 17;
                let b = channel(&hex[2..3])? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Format as `#RRGGBB`. Alpha is dropped; opacity travels separately.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Color with the alpha channel scaled by `opacity` (clamped to 0..=1).
    pub fn with_opacity(&self, opacity: f64) -> Color {
        let alpha = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Color::from_rgba8(self.r, self.g, self.b, alpha)
    }
}

impl fmt::Display for SerializableColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Which drawing tool produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    Pen,
    Highlighter,
}

/// A freehand stroke (series of points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: AnnotationId,
    pub kind: StrokeKind,
    /// Points in drawing order, page-local coordinates.
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub stroke_width: f64,
    /// 0.0 = fully transparent, 1.0 = fully opaque.
    pub opacity: f64,
}

impl Stroke {
    /// Create a stroke with a fresh id.
    pub fn new(
        kind: StrokeKind,
        points: Vec<Point>,
        color: SerializableColor,
        stroke_width: f64,
        opacity: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            points,
            color,
            stroke_width,
            opacity,
        }
    }

    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }

    /// Check if `point` lies on the stroke, widened by half the stroke width.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let reach = tolerance + self.stroke_width / 2.0;
        match self.points.as_slice() {
            [] => false,
            [only] => only.distance(point) <= reach,
            points => point_to_polyline_dist(point, points) <= reach,
        }
    }

    pub fn translate(&mut self, offset: Vec2) {
        for p in &mut self.points {
            *p += offset;
        }
    }
}

/// A text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub id: AnnotationId,
    pub text: String,
    /// Top-left corner of the text box.
    pub position: Point,
    pub font_size: f64,
    pub font_family: String,
    pub color: SerializableColor,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl TextBox {
    /// Approximate bounds from character count and font size.
    ///
    /// The live surface knows the real layout; this is only used for
    /// hit testing where no layout engine is available.
    pub fn bounds(&self) -> Rect {
        let widest = self.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let mut lines = self.text.lines().count().max(1);
        if self.text.ends_with('\n') {
            lines += 1;
        }
        let factor = if self.bold { 0.6 } else { 0.55 };
        let width = (widest as f64 * self.font_size * factor).max(20.0);
        let height = lines as f64 * self.font_size * 1.2;
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + width,
            self.position.y + height,
        )
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }
}

/// A single committed mark on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Annotation {
    Stroke(Stroke),
    Text(TextBox),
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Stroke(s) => s.id,
            Annotation::Text(t) => t.id,
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Annotation::Stroke(s) => s.bounds(),
            Annotation::Text(t) => t.bounds(),
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Annotation::Stroke(s) => s.hit_test(point, tolerance),
            Annotation::Text(t) => t.hit_test(point, tolerance),
        }
    }

    /// Copy of this annotation moved by `offset`, keeping its id.
    pub fn translated(&self, offset: Vec2) -> Self {
        let mut moved = self.clone();
        match &mut moved {
            Annotation::Stroke(s) => s.translate(offset),
            Annotation::Text(t) => t.position += offset,
        }
        moved
    }

    pub fn as_text(&self) -> Option<&TextBox> {
        match self {
            Annotation::Text(t) => Some(t),
            Annotation::Stroke(_) => None,
        }
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}
