//! Owned markup tree for content documents.
//!
//! Documents are parsed once with `scraper` (html5ever underneath, so broken
//! XHTML still yields a tree) and copied into a plain element/text tree that the
//! structured-text extraction walks without touching the parser's arena.

use scraper::{ElementRef, Html};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased local name (`p`, `img`, `image`, ...).
    pub name: String,
    /// Attributes by local name; `xlink:href` on SVG content is stored as `href`.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Image reference of an `img`/`image` element, blank values ignored.
    pub fn image_source(&self) -> Option<&str> {
        ["src", "xlink:href", "href"]
            .iter()
            .filter_map(|name| self.attr(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    }

    pub fn is_image(&self) -> bool {
        matches!(self.name.as_str(), "img" | "image")
    }

    /// All descendant text, whitespace-collapsed and trimmed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        collect_text(self, &mut raw);
        crate::encoding::collapse_whitespace(&raw).trim().to_string()
    }

    /// First descendant element (pre-order, excluding `self`) matching `pred`.
    pub fn find_first<F>(&self, pred: &F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        for child in &self.children {
            if let Node::Element(el) = child {
                if pred(el) {
                    return Some(el);
                }
                if let Some(found) = el.find_first(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Split off the first descendant element matching `pred`, returning the
    /// remaining tree and the detached element.
    pub fn without_first<F>(mut self, pred: &F) -> (Element, Option<Element>)
    where
        F: Fn(&Element) -> bool,
    {
        let taken = take_first(&mut self, pred);
        (self, taken)
    }
}

fn take_first<F>(el: &mut Element, pred: &F) -> Option<Element>
where
    F: Fn(&Element) -> bool,
{
    for i in 0..el.children.len() {
        let hit = matches!(&el.children[i], Node::Element(child) if pred(child));
        if hit {
            if let Node::Element(found) = el.children.remove(i) {
                return Some(found);
            }
            return None;
        }
        if let Node::Element(child) = &mut el.children[i] {
            if let Some(found) = take_first(child, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if is_non_content(&e.name) => {}
            Node::Element(e) => collect_text(e, out),
        }
    }
}

/// Elements whose text is never reader-visible content.
pub fn is_non_content(name: &str) -> bool {
    matches!(name, "script" | "style" | "head" | "title" | "template" | "noscript")
}

/// Parse a content document and return its `<body>` (or the root element when
/// the parser produced no body). Elements nested deeper than `max_depth` are dropped.
pub fn parse_body(source: &str, max_depth: u32) -> Element {
    let html = Html::parse_document(source);
    let root = html.root_element();
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root);

    let mut truncated = false;
    let tree = build(body, 0, max_depth, &mut truncated);
    if truncated {
        tracing::warn!("Markup nesting exceeds {} levels, deeper content dropped", max_depth);
    }
    tree
}

fn build(el: ElementRef<'_>, depth: u32, max_depth: u32, truncated: &mut bool) -> Element {
    let value = el.value();
    let mut element = Element {
        name: value.name().to_ascii_lowercase(),
        attrs: value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children: Vec::new(),
    };

    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if depth + 1 > max_depth {
                *truncated = true;
                continue;
            }
            element
                .children
                .push(Node::Element(build(child_el, depth + 1, max_depth, truncated)));
        } else if let Some(text) = child.value().as_text() {
            element.children.push(Node::Text(String::from(&**text)));
        }
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_body_children() {
        let body = parse_body("<html><body><p>Hi <b>there</b></p></body></html>", 200);
        assert_eq!(body.name, "body");
        let p = body.find_first(&|e: &Element| e.name == "p").unwrap();
        assert_eq!(p.text(), "Hi there");
    }

    #[test]
    fn tolerates_xhtml_prolog_and_namespaces() {
        let src = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>T</title><style>p{}</style></head>
<body><h2 class="c">Title</h2>
<p>Text</p></body></html>"#;
        let body = parse_body(src, 200);
        let h = body.find_first(&Element::is_heading).unwrap();
        assert_eq!(h.text(), "Title");
        assert_eq!(body.text(), "Title Text");
    }

    #[test]
    fn svg_image_exposes_href() {
        let src = r#"<html><body><svg xmlns:xlink="http://www.w3.org/1999/xlink">
<image xlink:href="../images/cover.jpg" width="10" height="20"/></svg></body></html>"#;
        let body = parse_body(src, 200);
        let img = body.find_first(&Element::is_image).unwrap();
        assert_eq!(img.image_source(), Some("../images/cover.jpg"));
    }

    #[test]
    fn without_first_detaches_only_first_match() {
        let body = parse_body("<body><div><h1>A</h1></div> <h2>B</h2> <p>x</p></body>", 200);
        let (rest, heading) = body.without_first(&Element::is_heading);
        assert_eq!(heading.unwrap().text(), "A");
        assert_eq!(rest.text(), "B x");
    }

    #[test]
    fn depth_limit_drops_deep_elements() {
        let body = parse_body("<body><div><div><div><p>deep</p></div></div></div><p>top</p></body>", 2);
        assert_eq!(body.text(), "top");
    }
}
