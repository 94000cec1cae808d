//! Structured text: the flat chapter body format shared with the renderer.
//!
//! A body is a sequence of units separated by a blank line (`"\n\n"`). A unit is
//! either a paragraph of plain text (which may contain single newlines) or one
//! image placeholder token `<img src="PATH" yrel="RATIO">`, where `PATH` is the
//! resolved archive path and `RATIO` is height / width. In text units `&` and `<`
//! are written as `&amp;` and `&lt;`, so text never reads as a tag.

use crate::encoding::collapse_whitespace;
use crate::markup::{is_non_content, Element, Node};

pub const UNIT_SEPARATOR: &str = "\n\n";

/// Height / width used when an image cannot be decoded.
pub const DEFAULT_IMAGE_RATIO: f32 = 1.45;

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlaceholder {
    pub path: String,
    pub aspect_ratio: f32,
}

impl ImagePlaceholder {
    pub fn new(path: impl Into<String>, aspect_ratio: f32) -> Self {
        Self {
            path: path.into(),
            aspect_ratio,
        }
    }

    pub fn to_token(&self) -> String {
        format!(
            r#"<img src="{}" yrel="{:.2}">"#,
            escape_attr(&self.path),
            self.aspect_ratio
        )
    }

    /// Parse a unit produced by [`ImagePlaceholder::to_token`].
    pub fn parse(unit: &str) -> Option<Self> {
        let inner = unit.trim().strip_prefix("<img ")?.strip_suffix('>')?;
        let path = unescape_attr(attr_value(inner, "src")?);
        let aspect_ratio = attr_value(inner, "yrel")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_IMAGE_RATIO);
        Some(Self { path, aspect_ratio })
    }
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(r#"{name}=""#);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Escape source text for a text unit.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;")
}

pub fn unescape_text(s: &str) -> String {
    s.replace("&lt;", "<").replace("&amp;", "&")
}

/// One renderable unit of a chapter body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyUnit {
    Text(String),
    Image(ImagePlaceholder),
}

/// Split a body on blank lines into text and image units. Empty units are skipped.
pub fn split_units(body: &str) -> Vec<BodyUnit> {
    body.split(UNIT_SEPARATOR)
        .map(|unit| unit.trim_matches('\n'))
        .filter(|unit| !unit.trim().is_empty())
        .map(|unit| match ImagePlaceholder::parse(unit) {
            Some(img) => BodyUnit::Image(img),
            None => BodyUnit::Text(unescape_text(unit)),
        })
        .collect()
}

/// Paths of every image placeholder in a body, in order.
pub fn image_paths(body: &str) -> Vec<String> {
    split_units(body)
        .into_iter()
        .filter_map(|unit| match unit {
            BodyUnit::Image(img) => Some(img.path),
            BodyUnit::Text(_) => None,
        })
        .collect()
}

/// Turns an `<img>`/`<image>` reference into a placeholder, or `None` to drop it.
pub trait ImageResolver {
    fn placeholder(&self, src: &str) -> Option<ImagePlaceholder>;
}

/// Convert a document body into structured text.
pub fn extract(body: &Element, images: &dyn ImageResolver) -> String {
    let mut out = String::new();
    block_children(body, images, &mut out);
    normalize_separators(&out)
}

/// A single image as a complete body (used for image-only spine items).
pub fn image_body(placeholder: &ImagePlaceholder) -> String {
    format!("{}{}", placeholder.to_token(), UNIT_SEPARATOR)
}

fn block_children(el: &Element, images: &dyn ImageResolver, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => {
                let text = collapse_whitespace(t);
                let text = text.trim();
                if !text.is_empty() {
                    out.push_str(&escape_text(text));
                    out.push_str(UNIT_SEPARATOR);
                }
            }
            Node::Element(e) => match e.name.as_str() {
                name if is_non_content(name) => {}
                "p" => paragraph(e, images, out),
                "br" => out.push('\n'),
                "hr" => out.push_str(UNIT_SEPARATOR),
                "img" | "image" => image_unit(e, images, out),
                _ => block_children(e, images, out),
            },
        }
    }
}

fn paragraph(p: &Element, images: &dyn ImageResolver, out: &mut String) {
    let mut raw = String::new();
    inline_children(p, images, &mut raw);
    let line = raw.split('\n').map(str::trim).collect::<Vec<_>>().join("\n");
    let line = line.trim_matches('\n');
    if !line.is_empty() {
        out.push_str(line);
        out.push_str(UNIT_SEPARATOR);
    }
}

fn inline_children(el: &Element, images: &dyn ImageResolver, line: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => line.push_str(&escape_text(&collapse_whitespace(t))),
            Node::Element(e) => match e.name.as_str() {
                name if is_non_content(name) => {}
                "br" => line.push('\n'),
                "img" | "image" => image_unit(e, images, line),
                _ => inline_children(e, images, line),
            },
        }
    }
}

fn image_unit(el: &Element, images: &dyn ImageResolver, out: &mut String) {
    let Some(src) = el.image_source() else {
        return;
    };
    match images.placeholder(src) {
        Some(placeholder) => {
            out.push_str(UNIT_SEPARATOR);
            out.push_str(&placeholder.to_token());
            out.push_str(UNIT_SEPARATOR);
        }
        None => tracing::debug!("Dropping unresolved image reference {}", src),
    }
}

/// Collapse runs of three or more newlines into one blank line and drop
/// leading newlines, so units never contain a blank line of their own.
pub fn normalize_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines > 0 && !out.is_empty() {
            out.push_str(if newlines == 1 { "\n" } else { UNIT_SEPARATOR });
        }
        newlines = 0;
        out.push(c);
    }
    if newlines > 0 && !out.is_empty() {
        out.push_str(if newlines == 1 { "\n" } else { UNIT_SEPARATOR });
    }
    out
}
