//! OPF package document: metadata, manifest, spine and guide.

use std::collections::{BTreeSet, HashMap};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader as XmlReader;

use crate::document::ManifestItem;
use crate::error::ParseError;
use crate::path;

pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    /// Manifest id named by `<meta name="cover" content="...">`.
    pub cover_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReference {
    pub kind: String,
    /// Raw href as written in the OPF.
    pub href: String,
}

/// Parsed package document with a unified manifest/spine index.
#[derive(Debug, Clone)]
pub struct Package {
    pub opf_path: String,
    /// Directory holding the OPF; manifest hrefs resolve against it.
    pub root_dir: String,
    pub metadata: PackageMetadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    /// `itemref idref`s in reading order, dangling ones included.
    pub spine: Vec<String>,
    /// Manifest id from `<spine toc="...">`.
    pub toc_id: Option<String>,
    pub guide: Vec<GuideReference>,
    by_id: HashMap<String, usize>,
}

impl Package {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&i| &self.manifest[i])
    }

    pub fn item_by_path(&self, resolved_path: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.resolved_path == resolved_path)
    }

    /// Spine items in reading order; `itemref`s with unknown ids are skipped.
    pub fn spine_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.spine.iter().filter_map(move |idref| {
            let item = self.item(idref);
            if item.is_none() {
                tracing::debug!("Spine itemref '{}' has no manifest item", idref);
            }
            item
        })
    }

    pub fn items_with_media_type<'a>(&'a self, media_type: &'a str) -> impl Iterator<Item = &'a ManifestItem> {
        self.manifest
            .iter()
            .filter(move |item| item.media_type.eq_ignore_ascii_case(media_type))
    }

    pub fn items_with_property<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a ManifestItem> {
        self.manifest.iter().filter(move |item| item.has_property(property))
    }

    pub fn guide_reference(&self, kind: &str) -> Option<&GuideReference> {
        self.guide.iter().find(|r| r.kind.eq_ignore_ascii_case(kind))
    }
}

enum Capture {
    Title,
    Creator,
    Description,
    MetaProperty(String),
}

#[derive(Default)]
struct DescriptionCandidates {
    dc: Option<String>,
    meta_name: Option<String>,
    dcterms: Option<String>,
    dc_property: Option<String>,
}

impl DescriptionCandidates {
    fn pick(self) -> Option<String> {
        self.dc
            .or(self.meta_name)
            .or(self.dcterms)
            .or(self.dc_property)
    }
}

/// Parse the OPF at `opf_path`. A missing `<manifest>` or `<spine>` is fatal;
/// XML errors stop the scan but keep what was read up to that point.
pub fn parse_package(content: &str, opf_path: &str) -> Result<Package, ParseError> {
    let root_dir = path::parent_dir(opf_path).to_string();

    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();

    let mut metadata = PackageMetadata::default();
    let mut descriptions = DescriptionCandidates::default();
    let mut manifest: Vec<ManifestItem> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut spine = Vec::new();
    let mut toc_id = None;
    let mut guide = Vec::new();

    let mut has_manifest = false;
    let mut has_spine = false;
    let mut in_metadata = false;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        buf.clear();
        let (e, is_empty) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e.into_owned(), false),
            Ok(Event::Empty(e)) => (e.into_owned(), true),
            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    text.push_str(&unescape_text(&e));
                }
                continue;
            }
            Ok(Event::CData(e)) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
                continue;
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }
                if let Some(kind) = capture.take() {
                    let value = crate::encoding::collapse_whitespace(&text).trim().to_string();
                    if !value.is_empty() {
                        match kind {
                            Capture::Title => {
                                metadata.title.get_or_insert(value);
                            }
                            Capture::Creator => {
                                metadata.creator.get_or_insert(value);
                            }
                            Capture::Description => {
                                descriptions.dc.get_or_insert(value);
                            }
                            Capture::MetaProperty(p) if p == "dcterms:description" => {
                                descriptions.dcterms.get_or_insert(value);
                            }
                            Capture::MetaProperty(p) if p == "dc:description" => {
                                descriptions.dc_property.get_or_insert(value);
                            }
                            Capture::MetaProperty(_) => {}
                        }
                    }
                    text.clear();
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Stopped reading {} early: {}", opf_path, e);
                break;
            }
            Ok(_) => continue,
        };

        let attrs = attributes(&e);
        let attr = |name: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        match local_name(&e).as_str() {
            "metadata" => in_metadata = !is_empty,
            "manifest" => has_manifest = true,
            "spine" => {
                has_spine = true;
                toc_id = attr("toc").map(str::to_string).filter(|s| !s.is_empty());
            }
            "title" if in_metadata && !is_empty => start_capture(&mut capture, &mut text, Capture::Title),
            "creator" if in_metadata && !is_empty => start_capture(&mut capture, &mut text, Capture::Creator),
            "description" if in_metadata && !is_empty => {
                start_capture(&mut capture, &mut text, Capture::Description)
            }
            "meta" if in_metadata => {
                match (attr("name"), attr("content")) {
                    (Some("cover"), Some(id)) if !id.trim().is_empty() => {
                        metadata.cover_id.get_or_insert_with(|| id.trim().to_string());
                    }
                    (Some("description"), Some(d)) if !d.trim().is_empty() => {
                        descriptions.meta_name.get_or_insert_with(|| d.trim().to_string());
                    }
                    _ => {}
                }
                if let (Some(property), false) = (attr("property"), is_empty) {
                    start_capture(&mut capture, &mut text, Capture::MetaProperty(property.to_string()));
                }
            }
            "item" if has_manifest => {
                let (Some(id), Some(href)) = (attr("id"), attr("href")) else {
                    tracing::warn!("Skipping manifest item without id or href");
                    continue;
                };
                if id.is_empty() || href.trim().is_empty() {
                    tracing::warn!("Skipping manifest item with empty id or href");
                    continue;
                }
                let item = ManifestItem {
                    id: id.to_string(),
                    resolved_path: path::resolve(href.trim(), &root_dir),
                    media_type: attr("media-type").unwrap_or("").trim().to_string(),
                    properties: attr("properties")
                        .map(|p| p.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_else(BTreeSet::new),
                    spine_index: None,
                };
                match by_id.get(&item.id) {
                    Some(&existing) => manifest[existing] = item,
                    None => {
                        by_id.insert(item.id.clone(), manifest.len());
                        manifest.push(item);
                    }
                }
            }
            "itemref" if has_spine => {
                if let Some(idref) = attr("idref").filter(|s| !s.is_empty()) {
                    spine.push(idref.to_string());
                }
            }
            "reference" => {
                if let (Some(kind), Some(href)) = (attr("type"), attr("href")) {
                    guide.push(GuideReference {
                        kind: kind.to_string(),
                        href: href.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    if !has_manifest {
        return Err(ParseError::PackageDocument(
            ".opf file manifest section missing".into(),
        ));
    }
    if !has_spine {
        return Err(ParseError::PackageDocument(
            ".opf file spine section missing".into(),
        ));
    }

    for (position, idref) in spine.iter().enumerate() {
        if let Some(&i) = by_id.get(idref) {
            manifest[i].spine_index.get_or_insert(position);
        }
    }

    metadata.description = descriptions.pick();

    tracing::debug!(
        "Package {}: {} manifest items, {} spine entries",
        opf_path,
        manifest.len(),
        spine.len()
    );

    Ok(Package {
        opf_path: opf_path.to_string(),
        root_dir,
        metadata,
        manifest,
        spine,
        toc_id,
        guide,
        by_id,
    })
}

fn start_capture(capture: &mut Option<Capture>, text: &mut String, kind: Capture) {
    *capture = Some(kind);
    text.clear();
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// Attributes keyed by local name with entities unescaped.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

pub(crate) fn unescape_text(e: &BytesText<'_>) -> String {
    e.unescape()
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}
