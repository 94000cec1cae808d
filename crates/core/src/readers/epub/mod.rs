//! EPUB reader: ZIP → container → OPF → navigation, cover, images, chapters → `Book`.
//! Handles EPUB2 (NCX) and EPUB3 (navigation document) packages.

pub mod container;
pub mod content;
pub mod cover;
pub mod images;
pub mod navigation;
pub mod package;

use std::io::{Read, Seek};

use crate::archive::Archive;
use crate::document::{file_name_for_title, Book};
use crate::encoding;
use crate::error::ParseError;
use crate::readers::ParseOptions;
use crate::security;

pub const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

pub struct EpubReader;

impl EpubReader {
    /// Read an EPUB from a seekable byte source.
    pub fn read<R: Read + Seek>(input: R, opts: &ParseOptions) -> Result<Book, ParseError> {
        let archive = Archive::from_reader(input, &opts.security)?;
        Self::read_archive(&archive, opts)
    }

    /// Build a book from an already-read archive.
    pub fn read_archive(archive: &Archive, opts: &ParseOptions) -> Result<Book, ParseError> {
        if let Some(encryption) = archive.read_text(ENCRYPTION_PATH) {
            security::check_epub_drm(&encryption)?;
        }

        let opf_path = container::find_opf_path(archive)?;
        let opf = archive
            .read_text(&opf_path)
            .ok_or_else(|| ParseError::MissingPackageDocument(opf_path.clone()))?;
        let package = package::parse_package(&opf, &opf_path)?;

        let toc = navigation::parse_toc(archive, &package, &opts.security);
        let cover = cover::find_cover(archive, &package, &opts.security);
        let images = images::collect_images(archive, &package);
        let chapters = content::parse_chapters(archive, &package, &toc, &images, cover.as_ref(), opts);

        let metadata = package.metadata;
        let title = metadata
            .title
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let mut book = Book {
            file_name: file_name_for_title(&title),
            title,
            author: metadata.creator,
            description: metadata.description,
            cover,
            chapters,
            images,
            toc,
        };
        if opts.normalize_unicode {
            encoding::normalize_book(&mut book);
        }

        tracing::debug!(
            "Parsed '{}': {} chapters, {} images, {} TOC entries",
            book.title,
            book.chapters.len(),
            book.images.len(),
            book.toc.len()
        );
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SecurityError;

    fn minimal(extra: Vec<(&str, Vec<u8>)>) -> Archive {
        let mut files = vec![
            (
                "META-INF/container.xml",
                br#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#.to_vec(),
            ),
            (
                "content.opf",
                br#"<package><manifest><item id="c" href="c.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="c"/></spine></package>"#
                    .to_vec(),
            ),
            ("c.xhtml", b"<body><p>x</p></body>".to_vec()),
        ];
        files.extend(extra);
        Archive::from_entries(files)
    }

    #[test]
    fn missing_title_defaults() {
        let book = EpubReader::read_archive(&minimal(vec![]), &ParseOptions::default()).unwrap();
        assert_eq!(book.title, UNKNOWN_TITLE);
        assert_eq!(book.file_name, UNKNOWN_TITLE);
        assert_eq!(book.chapters.len(), 1);
    }

    #[test]
    fn missing_package_document_is_fatal() {
        let archive = Archive::from_entries(vec![(
            "META-INF/container.xml",
            br#"<container><rootfiles><rootfile full-path="OPS/p.opf"/></rootfiles></container>"#.to_vec(),
        )]);
        let err = EpubReader::read_archive(&archive, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingPackageDocument(ref p) if p == "OPS/p.opf"));
    }

    #[test]
    fn drm_is_rejected_font_obfuscation_is_not() {
        let adept = br#"<encryption><EncryptedData><KeyInfo xmlns="http://ns.adobe.com/adept"/></EncryptedData></encryption>"#;
        let err = EpubReader::read_archive(&minimal(vec![(ENCRYPTION_PATH, adept.to_vec())]), &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::Security(SecurityError::DrmProtected { .. })));

        let fonts = br#"<encryption><EncryptedData><EncryptionMethod Algorithm="http://www.idpf.org/2008/embedding"/></EncryptedData></encryption>"#;
        assert!(EpubReader::read_archive(&minimal(vec![(ENCRYPTION_PATH, fonts.to_vec())]), &ParseOptions::default()).is_ok());
    }
}
