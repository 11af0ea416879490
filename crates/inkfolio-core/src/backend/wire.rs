//! Request and response bodies exchanged with the PDF service.
//!
//! Field names match the service's JSON.

use crate::annotation::{Annotation, StrokeKind};
use crate::document::{DocumentId, PageNumber, PageSize, Rotation, ThumbnailRef};
use crate::store::AnnotationMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A file sent as a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

/// Named page size understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    #[serde(rename = "A4")]
    A4,
    #[serde(rename = "LETTER")]
    Letter,
}

impl PageFormat {
    pub fn size(self) -> PageSize {
        match self {
            PageFormat::A4 => PageSize::A4,
            PageFormat::Letter => PageSize::LETTER,
        }
    }
}

/// Rendering quality for flattened annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Standard,
    #[default]
    High,
    Maximum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: DocumentId,
    pub original_name: String,
    pub num_pages: u32,
    #[serde(default)]
    pub page_sizes: Vec<PageSize>,
    #[serde(default)]
    pub thumbnail_urls: Vec<ThumbnailRef>,
}

/// Response of operations that change the page count or create a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCountResponse {
    #[serde(default)]
    pub success: bool,
    pub file_id: DocumentId,
    pub num_pages: u32,
    #[serde(default)]
    pub thumbnail_urls: Vec<ThumbnailRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderResponse {
    #[serde(default)]
    pub success: bool,
    pub file_id: DocumentId,
    pub new_order: Vec<PageNumber>,
    #[serde(default)]
    pub thumbnail_urls: Vec<ThumbnailRef>,
}

/// Response of operations that only re-render pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailsResponse {
    #[serde(default)]
    pub success: bool,
    pub file_id: DocumentId,
    #[serde(default)]
    pub thumbnail_urls: Vec<ThumbnailRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

/// Stored file description. PDF-only fields are absent for images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: DocumentId,
    pub original_name: String,
    pub file_type: String,
    #[serde(default)]
    pub num_pages: Option<u32>,
    #[serde(default)]
    pub page_sizes: Vec<PageSize>,
    #[serde(default)]
    pub metadata: Option<PdfMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePagesRequest {
    pub file_id: DocumentId,
    pub pages: Vec<PageNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderPagesRequest {
    pub file_id: DocumentId,
    pub new_order: Vec<PageNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatePagesRequest {
    pub file_id: DocumentId,
    pub pages: Vec<PageNumber>,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBlankPageRequest {
    pub file_id: DocumentId,
    pub position: PageNumber,
    #[serde(default)]
    pub page_size: PageFormat,
}

/// Image to insert as a new page. Sent as a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertImageRequest {
    pub file_id: DocumentId,
    pub position: PageNumber,
    pub page_size: PageFormat,
    pub image: UploadFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub file_id: DocumentId,
    /// Page number (as a string key) to that page's annotations.
    pub annotations: BTreeMap<String, Vec<ExportAnnotation>>,
    #[serde(default)]
    pub quality: ExportQuality,
}

/// Flat annotation record sent for flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportAnnotation {
    Pen {
        points: Vec<[f64; 2]>,
        color: String,
        width: f64,
        opacity: f64,
    },
    Highlighter {
        points: Vec<[f64; 2]>,
        color: String,
        width: f64,
        opacity: f64,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        font_size: f64,
        font_family: String,
        color: String,
        bold: bool,
        italic: bool,
        underline: bool,
    },
}

impl From<&Annotation> for ExportAnnotation {
    fn from(annotation: &Annotation) -> Self {
        match annotation {
            Annotation::Stroke(stroke) => {
                let points = stroke.points.iter().map(|p| [p.x, p.y]).collect();
                let color = stroke.color.to_hex();
                match stroke.kind {
                    StrokeKind::Pen => ExportAnnotation::Pen {
                        points,
                        color,
                        width: stroke.stroke_width,
                        opacity: stroke.opacity,
                    },
                    StrokeKind::Highlighter => ExportAnnotation::Highlighter {
                        points,
                        color,
                        width: stroke.stroke_width,
                        opacity: stroke.opacity,
                    },
                }
            }
            Annotation::Text(text) => ExportAnnotation::Text {
                text: text.text.clone(),
                x: text.position.x,
                y: text.position.y,
                font_size: text.font_size,
                font_family: text.font_family.clone(),
                color: text.color.to_hex(),
                bold: text.bold,
                italic: text.italic,
                underline: text.underline,
            },
        }
    }
}

/// Convert the committed annotations into the service's per-page layout.
/// Pages without annotations are left out.
pub fn flatten_annotations(annotations: &AnnotationMap) -> BTreeMap<String, Vec<ExportAnnotation>> {
    annotations
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .map(|(page, list)| (page.to_string(), list.iter().map(ExportAnnotation::from).collect()))
        .collect()
}
