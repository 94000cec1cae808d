//! Spine items → chapters with structured text bodies.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use super::package::Package;
use crate::archive::Archive;
use crate::document::{Chapter, CoverImage, ImageAsset, ManifestItem, TocEntry};
use crate::markup::{self, Element};
use crate::path;
use crate::readers::ParseOptions;
use crate::structured::{self, ImagePlaceholder, ImageResolver};

const DOCUMENT_EXTENSIONS: &[&str] = &["xhtml", "html", "xml", "htm"];

/// Resolves `<img>` references inside one content document.
pub struct ContentImages<'a> {
    archive: &'a Archive,
    doc_dir: &'a str,
    known: &'a HashSet<&'a str>,
    default_ratio: f32,
}

impl<'a> ContentImages<'a> {
    pub fn new(archive: &'a Archive, doc_dir: &'a str, known: &'a HashSet<&'a str>, default_ratio: f32) -> Self {
        Self {
            archive,
            doc_dir,
            known,
            default_ratio,
        }
    }
}

impl ImageResolver for ContentImages<'_> {
    fn placeholder(&self, src: &str) -> Option<ImagePlaceholder> {
        if src.starts_with("data:") || src.contains("://") {
            return None;
        }
        let resolved = path::join(self.doc_dir, src);
        if !self.known.contains(resolved.as_str()) {
            return None;
        }
        let ratio = self
            .archive
            .get(&resolved)
            .and_then(aspect_ratio)
            .unwrap_or(self.default_ratio);
        Some(ImagePlaceholder::new(resolved, ratio))
    }
}

/// Height / width of an encoded image, if its header can be read.
pub fn aspect_ratio(bytes: &[u8]) -> Option<f32> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    (width > 0 && height > 0).then(|| height as f32 / width as f32)
}

fn is_document(item: &ManifestItem) -> bool {
    path::extension(&item.resolved_path)
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// TOC titles keyed by lowercased target file; the first entry for a file wins.
fn toc_titles(toc: &[TocEntry]) -> HashMap<String, &str> {
    let mut titles = HashMap::new();
    for entry in toc.iter().filter(|e| !e.title.is_empty()) {
        titles
            .entry(entry.target_file().to_lowercase())
            .or_insert(entry.title.as_str());
    }
    titles
}

/// Walk the spine and build the accepted chapters. Ordinals count accepted
/// chapters only, so dropped items leave no gaps.
pub fn parse_chapters(
    archive: &Archive,
    package: &Package,
    toc: &[TocEntry],
    images: &[ImageAsset],
    cover: Option<&CoverImage>,
    opts: &ParseOptions,
) -> Vec<Chapter> {
    let titles = toc_titles(toc);
    let known: HashSet<&str> = images
        .iter()
        .chain(cover)
        .map(|img| img.path.as_str())
        .collect();

    let mut chapters: Vec<Chapter> = Vec::new();
    for item in package.spine_items() {
        let toc_title = titles
            .get(&item.resolved_path.to_lowercase())
            .map(|t| t.to_string());

        let accepted = if is_document(item) {
            document_chapter(archive, item, toc_title, &known, chapters.len(), opts)
        } else if item.is_image() {
            image_chapter(archive, item, toc_title, opts)
        } else {
            tracing::debug!("Skipping spine item {} ({})", item.id, item.media_type);
            None
        };

        if let Some((title, body)) = accepted {
            chapters.push(Chapter {
                path: item.resolved_path.clone(),
                title,
                body,
                ordinal: chapters.len(),
            });
        }
    }

    tracing::debug!(
        "Accepted {} of {} spine items as chapters",
        chapters.len(),
        package.spine.len()
    );
    chapters
}

fn document_chapter(
    archive: &Archive,
    item: &ManifestItem,
    toc_title: Option<String>,
    known: &HashSet<&str>,
    accepted: usize,
    opts: &ParseOptions,
) -> Option<(Option<String>, String)> {
    let Some(source) = archive.read_text(&item.resolved_path) else {
        tracing::debug!("Spine item {} is missing from the archive", item.resolved_path);
        return None;
    };

    let body = markup::parse_body(&source, opts.security.max_nesting_depth);
    let (rest, heading) = body.without_first(&Element::is_heading);
    let heading = heading.map(|h| h.text()).filter(|t| !t.is_empty());

    let resolver = ContentImages::new(
        archive,
        path::parent_dir(&item.resolved_path),
        known,
        opts.default_image_ratio,
    );
    let text = structured::extract(&rest, &resolver);
    if text.trim().is_empty() {
        tracing::debug!("Dropping blank chapter {}", item.resolved_path);
        return None;
    }

    let title = toc_title
        .or(heading)
        .unwrap_or_else(|| format!("Chapter {}", accepted + 1));
    Some((Some(title), text))
}

fn image_chapter(
    archive: &Archive,
    item: &ManifestItem,
    toc_title: Option<String>,
    opts: &ParseOptions,
) -> Option<(Option<String>, String)> {
    let Some(bytes) = archive.get(&item.resolved_path) else {
        tracing::debug!("Image spine item {} is missing from the archive", item.resolved_path);
        return None;
    };
    let ratio = aspect_ratio(bytes).unwrap_or(opts.default_image_ratio);
    let placeholder = ImagePlaceholder::new(item.resolved_path.clone(), ratio);
    Some((toc_title, structured::image_body(&placeholder)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::epub::images::collect_images;
    use crate::readers::epub::package::parse_package;
    use pretty_assertions::assert_eq;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn book_parts(spine: &[(&str, &str, &str)], files: Vec<(&str, Vec<u8>)>) -> (Archive, Package) {
        let items: String = spine
            .iter()
            .map(|(id, href, mt)| format!(r#"<item id="{id}" href="{href}" media-type="{mt}"/>"#))
            .collect();
        let refs: String = spine
            .iter()
            .map(|(id, _, _)| format!(r#"<itemref idref="{id}"/>"#))
            .collect();
        let opf = format!("<package><manifest>{items}</manifest><spine>{refs}</spine></package>");
        (
            Archive::from_entries(files),
            parse_package(&opf, "OEBPS/content.opf").unwrap(),
        )
    }

    const XHTML: &str = "application/xhtml+xml";

    #[test]
    fn heading_becomes_title_and_is_removed_from_body() {
        let (archive, package) = book_parts(
            &[("c1", "c1.xhtml", XHTML)],
            vec![("OEBPS/c1.xhtml", b"<html><body><h1>Intro</h1><p>Hello</p></body></html>".to_vec())],
        );
        let chapters = parse_chapters(&archive, &package, &[], &[], None, &ParseOptions::default());
        assert_eq!(
            chapters,
            vec![Chapter {
                path: "OEBPS/c1.xhtml".into(),
                title: Some("Intro".into()),
                body: "Hello\n\n".into(),
                ordinal: 0,
            }]
        );
    }

    #[test]
    fn toc_title_beats_heading_and_fallback_is_numbered() {
        let (archive, package) = book_parts(
            &[("c1", "c1.xhtml", XHTML), ("c2", "c2.xhtml", XHTML)],
            vec![
                ("OEBPS/c1.xhtml", b"<body><h2>Heading</h2><p>one</p></body>".to_vec()),
                ("OEBPS/c2.xhtml", b"<body><p>two</p></body>".to_vec()),
            ],
        );
        let toc = vec![TocEntry {
            title: "From TOC".into(),
            target_path: "oebps/C1.xhtml#top".into(),
            depth: 0,
        }];
        let chapters = parse_chapters(&archive, &package, &toc, &[], None, &ParseOptions::default());
        assert_eq!(chapters[0].title.as_deref(), Some("From TOC"));
        assert_eq!(chapters[1].title.as_deref(), Some("Chapter 2"));
    }

    #[test]
    fn blank_and_missing_documents_consume_no_ordinal() {
        let (archive, package) = book_parts(
            &[
                ("blank", "blank.xhtml", XHTML),
                ("gone", "gone.xhtml", XHTML),
                ("css", "style.css", "text/css"),
                ("c", "c.xhtml", XHTML),
            ],
            vec![
                ("OEBPS/blank.xhtml", b"<body>  <div> </div><br/></body>".to_vec()),
                ("OEBPS/style.css", b"p{}".to_vec()),
                ("OEBPS/c.xhtml", b"<body><p>text</p></body>".to_vec()),
            ],
        );
        let chapters = parse_chapters(&archive, &package, &[], &[], None, &ParseOptions::default());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].ordinal, 0);
        assert_eq!(chapters[0].title.as_deref(), Some("Chapter 1"));
    }

    #[test]
    fn inline_image_uses_decoded_ratio() {
        let (archive, package) = book_parts(
            &[("c", "text/c.xhtml", XHTML)],
            vec![
                ("OEBPS/text/c.xhtml", br#"<body><p>See <img src="../img/p.png"/></p></body>"#.to_vec()),
                ("OEBPS/img/p.png", png(10, 20)),
            ],
        );
        let images = collect_images(&archive, &package);
        let chapters = parse_chapters(&archive, &package, &[], &images, None, &ParseOptions::default());
        assert_eq!(chapters[0].body, "See\n\n<img src=\"OEBPS/img/p.png\" yrel=\"2.00\">\n\n");
    }

    #[test]
    fn unknown_and_external_images_are_dropped() {
        let (archive, package) = book_parts(
            &[("c", "c.xhtml", XHTML)],
            vec![(
                "OEBPS/c.xhtml",
                br#"<body><p><img src="nowhere.png"/><img src="http://x/y.png"/><img src="data:image/png;base64,AA"/>kept</p></body>"#
                    .to_vec(),
            )],
        );
        let chapters = parse_chapters(&archive, &package, &[], &[], None, &ParseOptions::default());
        assert_eq!(chapters[0].body, "kept\n\n");
    }

    #[test]
    fn image_spine_item_becomes_image_chapter() {
        let (archive, package) = book_parts(
            &[("plate", "img/plate.jpg", "image/jpeg")],
            vec![("OEBPS/img/plate.jpg", b"not really a jpeg".to_vec())],
        );
        let chapters = parse_chapters(&archive, &package, &[], &[], None, &ParseOptions::default());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, None);
        assert_eq!(chapters[0].body, "<img src=\"OEBPS/img/plate.jpg\" yrel=\"1.45\">\n\n");
    }
}
