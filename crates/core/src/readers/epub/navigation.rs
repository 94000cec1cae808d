//! Table of contents: EPUB2 NCX, falling back to the EPUB3 navigation document.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use super::package::{attributes, unescape_text, Package, NCX_MEDIA_TYPE};
use crate::archive::Archive;
use crate::document::{ManifestItem, TocEntry};
use crate::encoding::collapse_whitespace;
use crate::markup::{self, Element, Node};
use crate::path;
use crate::security::SecurityLimits;

/// Build the flat, pre-order TOC. A book without navigation gets an empty list.
pub fn parse_toc(archive: &Archive, package: &Package, limits: &SecurityLimits) -> Vec<TocEntry> {
    if let Some(ncx) = find_ncx(package) {
        match archive.read_text(&ncx.resolved_path) {
            Some(content) => {
                let entries = parse_ncx(&content, &package.root_dir);
                if !entries.is_empty() {
                    tracing::debug!("TOC: {} entries from {}", entries.len(), ncx.resolved_path);
                    return entries;
                }
            }
            None => tracing::warn!("NCX {} is missing from the archive", ncx.resolved_path),
        }
    }

    if let Some(nav) = package.items_with_property("nav").next() {
        if let Some(content) = archive.read_text(&nav.resolved_path) {
            let entries = parse_nav_document(&content, path::parent_dir(&nav.resolved_path), limits);
            tracing::debug!("TOC: {} entries from {}", entries.len(), nav.resolved_path);
            return entries;
        }
    }

    tracing::debug!("No navigation document found");
    Vec::new()
}

/// NCX lookup order: manifest id `ncx`, the spine `toc` attribute, then media type.
fn find_ncx(package: &Package) -> Option<&ManifestItem> {
    package
        .item("ncx")
        .or_else(|| package.toc_id.as_deref().and_then(|id| package.item(id)))
        .or_else(|| package.items_with_media_type(NCX_MEDIA_TYPE).next())
}

struct Pending {
    title: String,
    src: Option<String>,
    depth: usize,
    labelled: bool,
}

/// Parse an NCX `navMap`. Targets resolve against `root_dir`, keeping fragments.
/// Points without a `<content src>` are dropped; their children keep their depth.
pub fn parse_ncx(content: &str, root_dir: &str) -> Vec<TocEntry> {
    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();
    let mut points: Vec<Pending> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_label = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"navPoint" => {
                    open.push(points.len());
                    points.push(Pending {
                        title: String::new(),
                        src: None,
                        depth: open.len() - 1,
                        labelled: false,
                    });
                }
                b"navLabel" => in_label = true,
                b"text" if in_label => in_text = true,
                b"content" => set_src(&mut points, &open, e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"content" => {
                set_src(&mut points, &open, e)
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(point) = open.last().map(|&i| &mut points[i]) {
                    if !point.labelled {
                        point.title.push_str(&unescape_text(e));
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"navPoint" => {
                    open.pop();
                }
                b"navLabel" => {
                    in_label = false;
                    if let Some(&i) = open.last() {
                        points[i].labelled = true;
                    }
                }
                b"text" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Stopped reading NCX early: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    points
        .into_iter()
        .filter_map(|p| {
            let src = p.src?;
            Some(TocEntry {
                title: collapse_whitespace(&p.title).trim().to_string(),
                target_path: path::resolve_link(&src, root_dir),
                depth: p.depth,
            })
        })
        .collect()
}

fn set_src(points: &mut [Pending], open: &[usize], e: &quick_xml::events::BytesStart<'_>) {
    let Some(&i) = open.last() else {
        return;
    };
    if points[i].src.is_some() {
        return;
    }
    points[i].src = attributes(e)
        .into_iter()
        .find(|(k, _)| k == "src")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

/// Parse an EPUB3 navigation document. Depth is the number of enclosing `<li>`s
/// inside the `toc` nav; hrefs resolve against the document's own directory.
pub fn parse_nav_document(content: &str, doc_dir: &str, limits: &SecurityLimits) -> Vec<TocEntry> {
    let body = markup::parse_body(content, limits.max_nesting_depth);
    let nav = body
        .find_first(&|e: &Element| e.name == "nav" && is_toc_nav(e))
        .or_else(|| body.find_first(&|e: &Element| e.name == "nav"));

    let mut entries = Vec::new();
    if let Some(nav) = nav {
        walk_nav(nav, 0, doc_dir, &mut entries);
    }
    entries
}

fn is_toc_nav(nav: &Element) -> bool {
    nav.attr("epub:type")
        .or_else(|| nav.attr("type"))
        .is_some_and(|t| t.split_whitespace().any(|v| v == "toc"))
        || nav.attr("role") == Some("doc-toc")
}

fn walk_nav(el: &Element, depth: usize, doc_dir: &str, out: &mut Vec<TocEntry>) {
    for child in &el.children {
        let Node::Element(child) = child else {
            continue;
        };
        if child.name != "li" {
            walk_nav(child, depth, doc_dir, out);
            continue;
        }
        if let Some(link) = nav_link(child) {
            if let Some(href) = link.attr("href").map(str::trim).filter(|h| !h.is_empty()) {
                let (file, fragment) = path::split_fragment(href);
                let mut target = path::join(doc_dir, file);
                if let Some(f) = fragment {
                    target = format!("{target}#{f}");
                }
                out.push(TocEntry {
                    title: link.text(),
                    target_path: target,
                    depth,
                });
            }
        }
        walk_nav(child, depth + 1, doc_dir, out);
    }
}

/// The entry's own `<a>`, ignoring links inside nested lists.
fn nav_link(li: &Element) -> Option<&Element> {
    for child in &li.children {
        if let Node::Element(e) = child {
            match e.name.as_str() {
                "a" => return Some(e),
                "ol" | "ul" => {}
                _ => {
                    if let Some(found) = nav_link(e) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::epub::package::parse_package;
    use pretty_assertions::assert_eq;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <docTitle><text>Book</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part
        One</text></navLabel>
      <content src="text/part1.xhtml"/>
      <navPoint id="p1c1" playOrder="2">
        <navLabel><text>Chapter 1 &amp; more</text></navLabel>
        <content src="text/ch1.xhtml#start"/>
        <navPoint id="p1c1s1" playOrder="3">
          <navLabel><text>Section</text></navLabel>
          <content src="text/ch1.xhtml#s1"/>
        </navPoint>
      </navPoint>
    </navPoint>
    <navPoint id="p2" playOrder="4">
      <navLabel><text>Part Two</text></navLabel>
      <content src="text/part2.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    fn entry(title: &str, target: &str, depth: usize) -> TocEntry {
        TocEntry {
            title: title.into(),
            target_path: target.into(),
            depth,
        }
    }

    #[test]
    fn ncx_is_flattened_in_pre_order_with_depth() {
        assert_eq!(
            parse_ncx(NCX, "OEBPS"),
            vec![
                entry("Part One", "OEBPS/text/part1.xhtml", 0),
                entry("Chapter 1 & more", "OEBPS/text/ch1.xhtml#start", 1),
                entry("Section", "OEBPS/text/ch1.xhtml#s1", 2),
                entry("Part Two", "OEBPS/text/part2.xhtml", 0),
            ]
        );
    }

    #[test]
    fn ncx_point_without_content_is_dropped() {
        let ncx = r#"<ncx><navMap>
            <navPoint><navLabel><text>Heading only</text></navLabel>
              <navPoint><navLabel><text>Child</text></navLabel><content src="c.xhtml"/></navPoint>
            </navPoint></navMap></ncx>"#;
        assert_eq!(parse_ncx(ncx, ""), vec![entry("Child", "c.xhtml", 1)]);
    }

    #[test]
    fn nav_document_depth_counts_list_items() {
        let nav = r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
<nav epub:type="toc"><h1>Contents</h1><ol>
  <li><a href="ch1.xhtml">One</a>
    <ol><li><a href="ch1.xhtml#a">One A</a></li></ol>
  </li>
  <li><span>Unlinked</span><ol><li><a href="../x/ch2.xhtml">Two</a></li></ol></li>
</ol></nav></body></html>"#;
        assert_eq!(
            parse_nav_document(nav, "OEBPS/text", &SecurityLimits::default()),
            vec![
                entry("One", "OEBPS/text/ch1.xhtml", 0),
                entry("One A", "OEBPS/text/ch1.xhtml#a", 1),
                entry("Two", "OEBPS/x/ch2.xhtml", 1),
            ]
        );
    }

    #[test]
    fn ncx_found_by_media_type_when_id_differs() {
        let opf = r#"<package><manifest>
            <item id="toc-file" href="nav.ncx" media-type="application/x-dtbncx+xml"/>
        </manifest><spine/></package>"#;
        let package = parse_package(opf, "OPS/content.opf").unwrap();
        let archive = Archive::from_entries(vec![("OPS/nav.ncx", NCX.as_bytes().to_vec())]);
        let toc = parse_toc(&archive, &package, &SecurityLimits::default());
        assert_eq!(toc.len(), 4);
        assert_eq!(toc[0].target_path, "OPS/text/part1.xhtml");
    }

    #[test]
    fn no_navigation_gives_empty_toc() {
        let package = parse_package("<package><manifest/><spine/></package>", "content.opf").unwrap();
        let toc = parse_toc(&Archive::default(), &package, &SecurityLimits::default());
        assert!(toc.is_empty());
    }
}
