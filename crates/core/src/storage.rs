//! Persistence boundary for parsed books.
//!
//! `BookStore` is what a host implements to keep a parsed `Book`. `DirStore`
//! lays a book out in a folder:
//!
//! ```text
//! <root>/<folder>/book.json              library row
//! <root>/<folder>/chapters/<path>.txt    chapter bodies, keyed by resolved path
//! <root>/<folder>/images/<path>          image bytes at their resolved paths
//! <root>/<folder>/cover                  cover bytes
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::{Book, TocEntry};
use crate::error::StorageError;
use crate::security;

pub const BOOK_FILE: &str = "book.json";
pub const CHAPTERS_DIR: &str = "chapters";
pub const IMAGES_DIR: &str = "images";
pub const COVER_FILE: &str = "cover";

pub trait BookStore {
    /// Store `book` under `folder`, replacing whatever was there.
    fn store(&self, folder: &str, book: &Book) -> Result<StoredBook, StorageError>;
}

/// Summary of one `store` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBook {
    pub folder: PathBuf,
    pub chapter_files: usize,
    pub image_files: usize,
    pub has_cover: bool,
}

/// The row written to `book.json`.
#[derive(Debug, Serialize)]
pub struct LibraryRow<'a> {
    pub title: &'a str,
    pub file_name: &'a str,
    pub author: Option<&'a str>,
    pub description: Option<&'a str>,
    pub cover: Option<&'static str>,
    pub cover_mime_type: Option<&'a str>,
    pub chapters: Vec<ChapterRow<'a>>,
    pub images: Vec<&'a str>,
    pub toc: &'a [TocEntry],
}

#[derive(Debug, Serialize)]
pub struct ChapterRow<'a> {
    pub ordinal: usize,
    pub title: Option<&'a str>,
    pub path: &'a str,
}

impl<'a> LibraryRow<'a> {
    pub fn for_book(book: &'a Book) -> Self {
        Self {
            title: &book.title,
            file_name: &book.file_name,
            author: book.author.as_deref(),
            description: book.description.as_deref(),
            cover: book.cover.as_ref().map(|_| COVER_FILE),
            cover_mime_type: book.cover.as_ref().and_then(|c| c.mime_type.as_deref()),
            chapters: book
                .chapters
                .iter()
                .map(|c| ChapterRow {
                    ordinal: c.ordinal,
                    title: c.title.as_deref(),
                    path: &c.path,
                })
                .collect(),
            images: book.images.iter().map(|i| i.path.as_str()).collect(),
            toc: &book.toc,
        }
    }
}

/// Directory-backed store rooted at `root`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    pretty_json: bool,
}

impl DirStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            pretty_json: true,
        }
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl BookStore for DirStore {
    fn store(&self, folder: &str, book: &Book) -> Result<StoredBook, StorageError> {
        let dir = self.root.join(safe_relative(folder)?);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        let row = LibraryRow::for_book(book);
        let json = if self.pretty_json {
            serde_json::to_vec_pretty(&row)?
        } else {
            serde_json::to_vec(&row)?
        };
        self.write(&dir.join(BOOK_FILE), &json)?;

        for chapter in &book.chapters {
            let file = dir
                .join(CHAPTERS_DIR)
                .join(safe_relative(&format!("{}.txt", chapter.path))?);
            self.write(&file, chapter.body.as_bytes())?;
        }

        for image in &book.images {
            let file = dir.join(IMAGES_DIR).join(safe_relative(&image.path)?);
            self.write(&file, &image.bytes)?;
        }

        if let Some(cover) = &book.cover {
            self.write(&dir.join(COVER_FILE), &cover.bytes)?;
        }

        tracing::debug!(
            "Stored '{}' in {} ({} chapters, {} images)",
            book.title,
            dir.display(),
            book.chapters.len(),
            book.images.len()
        );

        Ok(StoredBook {
            folder: dir,
            chapter_files: book.chapters.len(),
            image_files: book.images.len(),
            has_cover: book.cover.is_some(),
        })
    }
}

/// A relative path that cannot leave the directory it is joined to.
fn safe_relative(path: &str) -> Result<PathBuf, StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::UnsafePath(path.to_string()));
    }
    security::check_path_traversal(path).map_err(|_| StorageError::UnsafePath(path.to_string()))?;
    Ok(path.split(['/', '\\']).filter(|s| !s.is_empty()).collect())
}
