//! Image asset collection.

use std::collections::HashSet;

use super::package::Package;
use crate::archive::Archive;
use crate::document::ImageAsset;
use crate::path;

/// Extensions picked up from the archive even when the manifest omits them.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "gif", "raw", "jpg", "jpeg", "webp", "svg"];

pub fn has_image_extension(file: &str) -> bool {
    path::extension(file).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Manifest images that exist in the archive, then any other entry with an
/// image extension. Unique by path; the manifest entry wins.
pub fn collect_images(archive: &Archive, package: &Package) -> Vec<ImageAsset> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for item in package.manifest.iter().filter(|item| item.is_image()) {
        let Some(bytes) = archive.get(&item.resolved_path) else {
            tracing::debug!("Manifest image {} is missing from the archive", item.resolved_path);
            continue;
        };
        if seen.insert(item.resolved_path.clone()) {
            images.push(ImageAsset {
                path: item.resolved_path.clone(),
                bytes: bytes.to_vec(),
                mime_type: Some(item.media_type.clone()),
            });
        }
    }

    let declared = images.len();
    for entry in archive.entries().filter(|e| has_image_extension(e.path)) {
        if seen.insert(entry.path.to_string()) {
            images.push(ImageAsset {
                path: entry.path.to_string(),
                bytes: entry.bytes.to_vec(),
                mime_type: None,
            });
        }
    }

    tracing::debug!(
        "Collected {} images ({} undeclared)",
        images.len(),
        images.len() - declared
    );
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::epub::package::parse_package;

    #[test]
    fn manifest_images_first_then_heuristic() {
        let opf = r#"<package><manifest>
            <item id="b" href="img/b.PNG" media-type="image/png"/>
            <item id="gone" href="img/gone.jpg" media-type="image/jpeg"/>
            <item id="t" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
        </manifest><spine/></package>"#;
        let package = parse_package(opf, "OEBPS/content.opf").unwrap();
        let archive = Archive::from_entries(vec![
            ("OEBPS/img/a.jpg", vec![1]),
            ("OEBPS/img/b.PNG", vec![2]),
            ("OEBPS/text/ch1.xhtml", b"<html/>".to_vec()),
            ("OEBPS/fonts/f.otf", vec![3]),
        ]);

        let images = collect_images(&archive, &package);
        let paths: Vec<&str> = images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["OEBPS/img/b.PNG", "OEBPS/img/a.jpg"]);
        assert_eq!(images[0].mime_type.as_deref(), Some("image/png"));
        assert_eq!(images[1].mime_type, None);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_image_extension("a/B.JPEG"));
        assert!(has_image_extension("x.svg"));
        assert!(!has_image_extension("x.xhtml"));
        assert!(!has_image_extension("png"));
    }
}
