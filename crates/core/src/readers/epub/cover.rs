//! Cover image lookup.

use super::images::has_image_extension;
use super::package::Package;
use crate::archive::Archive;
use crate::document::{CoverImage, ImageAsset};
use crate::markup::{self, Element};
use crate::path;
use crate::security::SecurityLimits;

type CoverAttempt = fn(&Archive, &Package, &SecurityLimits) -> Option<CoverImage>;

/// Tried in order; the first hit wins.
const ATTEMPTS: &[(&str, CoverAttempt)] = &[
    ("meta name=cover", from_metadata),
    ("guide reference", from_guide),
    ("manifest id=cover", from_cover_id),
];

pub fn find_cover(archive: &Archive, package: &Package, limits: &SecurityLimits) -> Option<CoverImage> {
    for (source, attempt) in ATTEMPTS {
        if let Some(cover) = attempt(archive, package, limits) {
            tracing::debug!("Cover {} found via {}", cover.path, source);
            return Some(cover);
        }
    }
    tracing::debug!("No cover image found");
    None
}

fn from_metadata(archive: &Archive, package: &Package, _limits: &SecurityLimits) -> Option<CoverImage> {
    let id = package.metadata.cover_id.as_deref()?;
    let item = package.item(id)?;
    load(archive, package, &item.resolved_path)
}

fn from_guide(archive: &Archive, package: &Package, limits: &SecurityLimits) -> Option<CoverImage> {
    let reference = package.guide_reference("cover")?;
    let target = path::resolve(&reference.href, &package.root_dir);
    image_or_page(archive, package, &target, limits)
}

fn from_cover_id(archive: &Archive, package: &Package, limits: &SecurityLimits) -> Option<CoverImage> {
    let item = package.item("cover")?;
    image_or_page(archive, package, &item.resolved_path, limits)
}

/// Use `target` directly when it is an image, otherwise treat it as a cover
/// page and take its first `<img>`/`<image>`.
fn image_or_page(
    archive: &Archive,
    package: &Package,
    target: &str,
    limits: &SecurityLimits,
) -> Option<CoverImage> {
    let declared_image = package.item_by_path(target).is_some_and(|i| i.is_image());
    if declared_image || has_image_extension(target) {
        return load(archive, package, target);
    }

    let page = archive.read_text(target)?;
    let body = markup::parse_body(&page, limits.max_nesting_depth);
    let src = body.find_first(&Element::is_image)?.image_source()?.to_string();
    let image_path = path::join(path::parent_dir(target), &src);
    load(archive, package, &image_path)
}

fn load(archive: &Archive, package: &Package, image_path: &str) -> Option<CoverImage> {
    let bytes = archive.get(image_path)?;
    let mime_type = package
        .item_by_path(image_path)
        .map(|item| item.media_type.clone())
        .filter(|m| !m.is_empty());
    Some(ImageAsset {
        path: image_path.to_string(),
        bytes: bytes.to_vec(),
        mime_type,
    })
}
