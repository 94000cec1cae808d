use std::collections::BTreeSet;

use serde::Serialize;

/// The normalized book produced by one parse call.
/// Immutable once built; nothing in it refers back to the archive it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    pub file_name: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover: Option<CoverImage>,
    pub chapters: Vec<Chapter>,
    pub images: Vec<ImageAsset>,
    pub toc: Vec<TocEntry>,
}

impl Book {
    /// Look up an image asset by its resolved archive path.
    pub fn image(&self, path: &str) -> Option<&ImageAsset> {
        self.images.iter().find(|img| img.path == path)
    }
}

/// One accepted spine item. `body` is structured text (see `crate::structured`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub path: String,
    pub title: Option<String>,
    pub body: String,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub title: String,
    /// Resolved archive path, with the original `#fragment` kept when present.
    pub target_path: String,
    pub depth: usize,
}

impl TocEntry {
    /// Target path without its fragment, for matching against chapter paths.
    pub fn target_file(&self) -> &str {
        crate::path::strip_fragment(&self.target_path)
    }
}

/// An image file from the archive. Two assets are the same asset iff their paths match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub path: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

pub type CoverImage = ImageAsset;

/// A `<manifest><item>` with its href resolved to an archive key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestItem {
    pub id: String,
    pub resolved_path: String,
    pub media_type: String,
    pub properties: BTreeSet<String>,
    pub spine_index: Option<usize>,
}

impl ManifestItem {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }
}

/// Turn a book title into something usable as a file or folder name.
pub fn file_name_for_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "book".to_string()
    } else {
        cleaned.to_string()
    }
}
