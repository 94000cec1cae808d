//! Archive path resolution: percent-decoding, joining and lexical canonicalization.
//!
//! Every path stored in the model is a canonical archive key: forward slashes,
//! no `.`/`..` segments, no leading slash. Fragments (`#id`) and query strings
//! never reach a lookup key; `resolve_link` keeps the fragment for TOC targets.

use percent_encoding::percent_decode_str;

/// Resolve a manifest-style `href` against the package `base` directory.
///
/// The href is percent-decoded and prefixed with `base/` unless it already lives
/// under `base`, then canonicalized. Fragment and query are dropped.
pub fn resolve(href: &str, base: &str) -> String {
    let decoded = decode(strip_fragment(href));
    let base = base.trim_matches('/');

    if let Some(rooted) = decoded.strip_prefix('/') {
        return normalize(rooted);
    }
    if is_under(&decoded, base) {
        normalize(&decoded)
    } else {
        normalize(&format!("{base}/{decoded}"))
    }
}

/// Like [`resolve`], but keeps a `#fragment` on the result.
pub fn resolve_link(href: &str, base: &str) -> String {
    let (path, fragment) = split_fragment(href);
    with_fragment(resolve(path, base), fragment)
}

/// Join an href relative to a document directory (e.g. an `<img src>` inside
/// `OEBPS/text/ch1.xhtml` joins against `OEBPS/text`). A leading `/` means the
/// archive root.
pub fn join(dir: &str, href: &str) -> String {
    let decoded = decode(strip_fragment(href));
    match decoded.strip_prefix('/') {
        Some(rooted) => normalize(rooted),
        None if dir.is_empty() => normalize(&decoded),
        None => normalize(&format!("{dir}/{decoded}")),
    }
}

/// Collapse `.` and `..` segments, convert backslashes, drop empty segments.
/// A `..` that would climb above the archive root is discarded.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

pub fn decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Split `path#fragment` (query strings are discarded with the fragment).
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    let (before_fragment, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (href, None),
    };
    let path = before_fragment
        .split_once('?')
        .map(|(p, _)| p)
        .unwrap_or(before_fragment);
    (path, fragment.filter(|f| !f.is_empty()))
}

pub fn strip_fragment(href: &str) -> &str {
    split_fragment(href).0
}

fn with_fragment(path: String, fragment: Option<&str>) -> String {
    match fragment {
        Some(f) => format!("{path}#{f}"),
        None => path,
    }
}

/// Directory part of a canonical path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Lowercased extension of the last path segment, if any.
pub fn extension(path: &str) -> Option<String> {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rfind('.')
        .filter(|&i| i + 1 < file.len())
        .map(|i| file[i + 1..].to_ascii_lowercase())
}

fn is_under(path: &str, base: &str) -> bool {
    base.is_empty()
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}
