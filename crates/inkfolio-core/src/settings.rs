//! Tool selection and tool settings.

use crate::annotation::{SerializableColor, StrokeKind};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Select and move existing annotations.
    #[default]
    Select,
    Pen,
    Highlighter,
    Text,
    Eraser,
}

impl ToolKind {
    /// The stroke kind this tool draws, if it is a drawing tool.
    pub fn stroke_kind(self) -> Option<StrokeKind> {
        match self {
            ToolKind::Pen => Some(StrokeKind::Pen),
            ToolKind::Highlighter => Some(StrokeKind::Highlighter),
            ToolKind::Select | ToolKind::Text | ToolKind::Eraser => None,
        }
    }
}

/// Settings applied to newly created annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub pen_color: SerializableColor,
    pub pen_width: f64,
    pub highlighter_color: SerializableColor,
    pub highlighter_width: f64,
    pub highlighter_opacity: f64,
    pub font_family: String,
    pub font_size: f64,
    pub text_color: SerializableColor,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            pen_color: SerializableColor::black(),
            pen_width: 2.0,
            highlighter_color: SerializableColor::yellow(),
            highlighter_width: 20.0,
            highlighter_opacity: 0.4,
            font_family: "Helvetica".to_string(),
            font_size: 16.0,
            text_color: SerializableColor::black(),
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// Partial update for [`ToolSettings`]. `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettingsPatch {
    pub pen_color: Option<SerializableColor>,
    pub pen_width: Option<f64>,
    pub highlighter_color: Option<SerializableColor>,
    pub highlighter_width: Option<f64>,
    pub highlighter_opacity: Option<f64>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub text_color: Option<SerializableColor>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
}

impl ToolSettings {
    /// Shallow-merge a patch into these settings.
    pub fn merge(&mut self, patch: ToolSettingsPatch) {
        let ToolSettingsPatch {
            pen_color,
            pen_width,
            highlighter_color,
            highlighter_width,
            highlighter_opacity,
            font_family,
            font_size,
            text_color,
            bold,
            italic,
            underline,
        } = patch;
        if let Some(v) = pen_color {
            self.pen_color = v;
        }
        if let Some(v) = pen_width {
            self.pen_width = v;
        }
        if let Some(v) = highlighter_color {
            self.highlighter_color = v;
        }
        if let Some(v) = highlighter_width {
            self.highlighter_width = v;
        }
        if let Some(v) = highlighter_opacity {
            self.highlighter_opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = font_family {
            self.font_family = v;
        }
        if let Some(v) = font_size {
            self.font_size = v;
        }
        if let Some(v) = text_color {
            self.text_color = v;
        }
        if let Some(v) = bold {
            self.bold = v;
        }
        if let Some(v) = italic {
            self.italic = v;
        }
        if let Some(v) = underline {
            self.underline = v;
        }
    }

    /// Color, width and opacity used for strokes of `kind`.
    pub fn stroke_style(&self, kind: StrokeKind) -> (SerializableColor, f64, f64) {
        match kind {
            StrokeKind::Pen => (self.pen_color, self.pen_width, 1.0),
            StrokeKind::Highlighter => (
                self.highlighter_color,
                self.highlighter_width,
                self.highlighter_opacity,
            ),
        }
    }

    /// Brush for the free-draw surface, derived fresh from the current values.
    pub fn brush(&self, tool: ToolKind) -> Option<Brush> {
        let kind = tool.stroke_kind()?;
        let (color, width, opacity) = self.stroke_style(kind);
        Some(Brush {
            color: color.with_opacity(opacity),
            width,
        })
    }

    /// Snapshot of the text fields, used to style new text boxes.
    pub fn text_style(&self) -> TextStyle {
        TextStyle {
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            color: self.text_color,
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
        }
    }
}

/// Free-draw brush installed on the live surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Stroke color with the tool opacity folded into alpha.
    pub color: Color,
    pub width: f64,
}

/// Text styling captured when a text box is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub color: SerializableColor,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}
