use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque photo identifier as stored by the library (Lychee uses 24-char strings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoId(pub String);

impl PhotoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PhotoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PhotoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the singleton tag applied to grayscale photos.
pub const BW_TAG_NAME: &str = "Black & White";
/// Description used when the tag has to be created.
pub const BW_TAG_DESCRIPTION: &str = "Automatically detected black and white photos";

/// Tri-state classification stored in the photo's flag column.
/// `Unknown` is a NULL flag; once set it never returns to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Unknown,
    Grayscale,
    Color,
}

impl Classification {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Classification::Unknown,
            Some(true) => Classification::Grayscale,
            Some(false) => Classification::Color,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            Classification::Unknown => None,
            Classification::Grayscale => Some(true),
            Classification::Color => Some(false),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Unknown => "unknown",
            Classification::Grayscale => "grayscale",
            Classification::Color => "color",
        };
        write!(f, "{s}")
    }
}

/// Stored renditions of a photo, keyed by the library's size-variant type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionKind {
    Original,
    Large,
}

impl RenditionKind {
    /// Fetch priority: the reduced rendition first, the original as fallback.
    pub const PRIORITY: [RenditionKind; 2] = [RenditionKind::Large, RenditionKind::Original];

    pub fn type_code(self) -> i64 {
        match self {
            RenditionKind::Original => 0,
            RenditionKind::Large => 2,
        }
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenditionKind::Original => "original",
            RenditionKind::Large => "large",
        };
        write!(f, "{s}")
    }
}

/// A photo record as seen by the classifier pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: PhotoId,
    /// Coarse media type, e.g. `image/jpeg`. Video and raw kinds are never candidates.
    pub media_kind: String,
    /// Content hash; carried for logging only.
    pub checksum: Option<String>,
    /// Creation timestamp as stored by the library. Pages are ordered by it.
    pub created_at: String,
    pub large_path: Option<String>,
    pub original_path: Option<String>,
    pub classification: Classification,
}

impl Photo {
    /// Position of this photo in candidate order.
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            created_at: self.created_at.clone(),
            id: self.id.clone(),
        }
    }

    /// Candidate source paths in fetch priority order. Missing or blank paths are skipped.
    pub fn sources(&self) -> Vec<(RenditionKind, &str)> {
        RenditionKind::PRIORITY
            .iter()
            .filter_map(|kind| {
                let path = match kind {
                    RenditionKind::Large => self.large_path.as_deref(),
                    RenditionKind::Original => self.original_path.as_deref(),
                };
                path.filter(|p| !p.trim().is_empty()).map(|p| (*kind, p))
            })
            .collect()
    }
}

/// Keyset position in `(created_at, id)` order. Candidate pages after a cursor
/// only return photos that sort strictly after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: String,
    pub id: PhotoId,
}

/// Whether a media kind can ever be classified.
pub fn is_eligible_media_kind(kind: &str) -> bool {
    let lower = kind.to_ascii_lowercase();
    !lower.contains("video") && !lower.contains("raw")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: String,
}

/// Classification counts across the whole library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub grayscale: usize,
    pub color: usize,
    /// Photos that a pass would still select.
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(large: Option<&str>, original: Option<&str>) -> Photo {
        Photo {
            id: PhotoId::from("p"),
            media_kind: "image/jpeg".into(),
            checksum: None,
            created_at: "2024-01-01 00:00:00".into(),
            large_path: large.map(String::from),
            original_path: original.map(String::from),
            classification: Classification::Unknown,
        }
    }

    #[test]
    fn test_sources_prefer_large() {
        let p = photo(Some("large/a.jpg"), Some("original/a.jpg"));
        assert_eq!(
            p.sources(),
            vec![
                (RenditionKind::Large, "large/a.jpg"),
                (RenditionKind::Original, "original/a.jpg"),
            ]
        );
    }

    #[test]
    fn test_sources_skip_missing_and_blank() {
        assert_eq!(
            photo(None, Some("original/a.jpg")).sources(),
            vec![(RenditionKind::Original, "original/a.jpg")]
        );
        assert_eq!(
            photo(Some("  "), None).sources(),
            Vec::<(RenditionKind, &str)>::new()
        );
    }

    #[test]
    fn test_cursor_from_photo() {
        let cursor = photo(None, Some("o")).cursor();
        assert_eq!(cursor.id, PhotoId::from("p"));
        assert_eq!(cursor.created_at, "2024-01-01 00:00:00");
    }

    #[test]
    fn test_media_kind_eligibility() {
        assert!(is_eligible_media_kind("image/jpeg"));
        assert!(is_eligible_media_kind("image/webp"));
        assert!(!is_eligible_media_kind("video/mp4"));
        assert!(!is_eligible_media_kind("image/x-canon-cr2-raw"));
        assert!(!is_eligible_media_kind("RAW"));
    }

    #[test]
    fn test_classification_flag_round_trip() {
        assert_eq!(Classification::from_flag(None), Classification::Unknown);
        assert_eq!(Classification::from_flag(Some(true)), Classification::Grayscale);
        assert_eq!(Classification::Color.as_flag(), Some(false));
    }
}
