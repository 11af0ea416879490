//! Document and page model.

use crate::error::EditorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 1-indexed page position within the document.
pub type PageNumber = u32;

/// Stable page identifier, assigned once when a page enters the document.
///
/// Unlike [`PageNumber`], this never changes when pages are reordered, so
/// views can key animations and caches on it.
pub type PageId = Uuid;

/// Backend-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a rendered page image (usually a URL handed out by the backend).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailRef(pub String);

impl ThumbnailRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Clockwise page rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Add another rotation, wrapping at a full turn.
    pub fn rotated_by(self, other: Rotation) -> Rotation {
        match (self.degrees() + other.degrees()) % 360 {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = EditorError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(EditorError::InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// A page of the loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// Current 1-indexed position. Always equals index + 1 in [`Document::pages`].
    pub number: PageNumber,
    pub thumbnail: ThumbnailRef,
    pub size: PageSize,
    pub rotation: Rotation,
}

impl Page {
    pub fn new(number: PageNumber, size: PageSize, thumbnail: ThumbnailRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            thumbnail,
            size,
            rotation: Rotation::Deg0,
        }
    }
}

/// The document being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build a document from an upload-style response.
    ///
    /// Sizes and thumbnails are matched to pages by position; missing sizes fall
    /// back to US Letter and missing thumbnails stay empty.
    pub fn new(
        id: DocumentId,
        name: impl Into<String>,
        page_count: u32,
        sizes: &[PageSize],
        thumbnails: &[ThumbnailRef],
    ) -> Self {
        let pages = (0..page_count as usize)
            .map(|i| {
                Page::new(
                    i as PageNumber + 1,
                    sizes.get(i).copied().unwrap_or_default(),
                    thumbnails.get(i).cloned().unwrap_or_default(),
                )
            })
            .collect();
        Self {
            id,
            name: name.into(),
            pages,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn contains(&self, number: PageNumber) -> bool {
        number >= 1 && number <= self.page_count()
    }

    pub fn page(&self, number: PageNumber) -> Option<&Page> {
        (number as usize).checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub fn page_mut(&mut self, number: PageNumber) -> Option<&mut Page> {
        (number as usize)
            .checked_sub(1)
            .and_then(|i| self.pages.get_mut(i))
    }

    /// Page ids in display order.
    pub fn order(&self) -> Vec<PageId> {
        self.pages.iter().map(|p| p.id).collect()
    }

    pub fn number_of(&self, id: PageId) -> Option<PageNumber> {
        self.pages.iter().find(|p| p.id == id).map(|p| p.number)
    }

    /// Reassign page numbers from vector positions.
    pub(crate) fn renumber(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.number = i as PageNumber + 1;
        }
    }

    /// Check that `page` is a valid page number.
    pub fn check_page(&self, page: PageNumber) -> Result<(), EditorError> {
        if self.contains(page) {
            Ok(())
        } else {
            Err(EditorError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })
        }
    }

    /// Check that `order` is a permutation of `1..=page_count`.
    pub fn check_permutation(&self, order: &[PageNumber]) -> Result<(), EditorError> {
        let count = self.page_count() as usize;
        if order.len() != count {
            return Err(EditorError::InvalidPermutation(format!(
                "expected {} entries, got {}",
                count,
                order.len()
            )));
        }
        let mut seen = vec![false; count];
        for &n in order {
            let slot = (n as usize)
                .checked_sub(1)
                .and_then(|i| seen.get_mut(i))
                .ok_or_else(|| {
                    EditorError::InvalidPermutation(format!("page {n} is out of range"))
                })?;
            if *slot {
                return Err(EditorError::InvalidPermutation(format!(
                    "page {n} appears more than once"
                )));
            }
            *slot = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(count: u32) -> Document {
        Document::new(DocumentId::new("doc"), "test.pdf", count, &[], &[])
    }

    #[test]
    fn test_document_creation_defaults() {
        let sizes = [PageSize::A4];
        let thumbs = [ThumbnailRef::new("/t/1"), ThumbnailRef::new("/t/2")];
        let doc = Document::new(DocumentId::new("d"), "a.pdf", 3, &sizes, &thumbs);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[0].size, PageSize::A4);
        assert_eq!(doc.pages[2].size, PageSize::LETTER);
        assert!(doc.pages[2].thumbnail.is_empty());
        let numbers: Vec<_> = doc.pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_page_ids_are_unique() {
        let doc = doc(4);
        let mut ids = doc.order();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_check_permutation() {
        let doc = doc(3);
        assert!(doc.check_permutation(&[3, 1, 2]).is_ok());
        assert!(doc.check_permutation(&[1, 2]).is_err());
        assert!(doc.check_permutation(&[1, 1, 2]).is_err());
        assert!(doc.check_permutation(&[0, 1, 2]).is_err());
        assert!(doc.check_permutation(&[1, 2, 4]).is_err());
    }

    #[test]
    fn test_rotation() {
        assert_eq!(Rotation::try_from(90).ok(), Some(Rotation::Deg90));
        assert!(Rotation::try_from(45).is_err());
        assert_eq!(Rotation::Deg270.rotated_by(Rotation::Deg180), Rotation::Deg90);
        assert_eq!(serde_json::to_string(&Rotation::Deg180).ok().as_deref(), Some("180"));
    }

    #[test]
    fn test_page_lookup() {
        let doc = doc(2);
        assert!(doc.page(0).is_none());
        assert_eq!(doc.page(2).map(|p| p.number), Some(2));
        assert!(doc.page(3).is_none());
        assert!(doc.check_page(3).is_err());
    }
}
