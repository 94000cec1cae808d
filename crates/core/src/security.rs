//! Archive hardening: ZIP bomb and size limits, unsafe entry names, DRM detection.

use serde::{Deserialize, Serialize};

use crate::error::SecurityError;

const MIB: u64 = 1024 * 1024;

/// Entries smaller than this skip the per-entry ratio check.
const RATIO_CHECK_FLOOR: u64 = MIB;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Largest uncompressed:compressed ratio accepted for one entry.
    pub max_compression_ratio: u64,
    pub max_file_count: u64,
    pub max_resource_size_bytes: u64,
    /// Cap on the sum of all uncompressed entry sizes.
    pub max_total_size_bytes: u64,
    /// Maximum markup nesting depth kept when building document trees.
    pub max_nesting_depth: u32,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100,
            max_file_count: 10_000,
            max_resource_size_bytes: 200 * MIB,
            max_total_size_bytes: 1024 * MIB,
            max_nesting_depth: 200,
        }
    }
}

impl SecurityLimits {
    pub fn check_file_count(&self, count: u64) -> Result<(), SecurityError> {
        if count > self.max_file_count {
            return Err(SecurityError::TooManyFiles {
                count,
                limit: self.max_file_count,
            });
        }
        Ok(())
    }

    pub fn check_resource_size(&self, name: &str, size: u64) -> Result<(), SecurityError> {
        if size > self.max_resource_size_bytes {
            return Err(SecurityError::OversizedResource {
                name: name.to_string(),
                size_mb: size / MIB,
                limit_mb: self.max_resource_size_bytes / MIB,
            });
        }
        Ok(())
    }

    /// A stored entry (`compressed == 0`) may only be empty.
    pub fn check_compression_ratio(&self, compressed: u64, uncompressed: u64) -> Result<(), SecurityError> {
        let ratio = match compressed {
            0 if uncompressed == 0 => return Ok(()),
            0 => u64::MAX,
            c => uncompressed / c,
        };
        if ratio > self.max_compression_ratio {
            return Err(SecurityError::ZipBomb {
                ratio,
                limit: self.max_compression_ratio,
            });
        }
        Ok(())
    }

    /// Start tracking the running total of one archive read.
    pub fn budget(&self) -> EntryBudget<'_> {
        EntryBudget {
            limits: self,
            total: 0,
        }
    }
}

/// Running size accounting while entries are extracted.
#[derive(Debug)]
pub struct EntryBudget<'a> {
    limits: &'a SecurityLimits,
    total: u64,
}

impl EntryBudget<'_> {
    /// Admit one entry by its declared sizes, before it is read.
    pub fn admit(&mut self, name: &str, compressed: u64, uncompressed: u64) -> Result<(), SecurityError> {
        self.limits.check_resource_size(name, uncompressed)?;
        if uncompressed >= RATIO_CHECK_FLOOR {
            self.limits.check_compression_ratio(compressed, uncompressed)?;
        }
        self.total = self.total.saturating_add(uncompressed);
        if self.total > self.limits.max_total_size_bytes {
            return Err(SecurityError::OversizedResource {
                name: "<total>".to_string(),
                size_mb: self.total / MIB,
                limit_mb: self.limits.max_total_size_bytes / MIB,
            });
        }
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Reject entry names that are absolute, carry a drive letter, or climb with `..`.
pub fn check_path_traversal(entry_path: &str) -> Result<(), SecurityError> {
    let absolute = entry_path.starts_with(['/', '\\']);
    let drive = entry_path.as_bytes().get(1) == Some(&b':');
    let climbs = entry_path.split(['/', '\\']).any(|segment| segment == "..");
    if absolute || drive || climbs {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }
    Ok(())
}

/// Namespace markers of known DRM schemes in `META-INF/encryption.xml`.
const DRM_MARKERS: &[(&str, &str)] = &[
    ("http://ns.adobe.com/adept", "Adobe DRM"),
    ("http://ns.adobe.com/digitaleditions", "Adobe DRM"),
    ("http://www.apple.com/ibooks", "Apple FairPlay"),
    ("sinf.xml", "Apple FairPlay"),
    ("http://urms.org", "Sony URMS"),
];

/// Font obfuscation algorithms; encryption that only uses these is not DRM.
const FONT_OBFUSCATION: &[&str] = &[
    "http://www.idpf.org/2008/embedding",
    "http://ns.adobe.com/pdf/enc#RC",
];

/// Name of the DRM scheme an `encryption.xml` declares, if any.
pub fn detect_drm(encryption_xml: &str) -> Option<&'static str> {
    if let Some((_, scheme)) = DRM_MARKERS
        .iter()
        .find(|(marker, _)| encryption_xml.contains(marker))
    {
        return Some(*scheme);
    }
    let encrypted = encryption_xml.contains("EncryptedData");
    let only_fonts = FONT_OBFUSCATION.iter().any(|alg| encryption_xml.contains(alg));
    (encrypted && !only_fonts).then_some("Unknown DRM")
}

pub fn check_epub_drm(encryption_xml: &str) -> Result<(), SecurityError> {
    match detect_drm(encryption_xml) {
        Some(scheme) => Err(SecurityError::DrmProtected {
            drm_type: scheme.to_string(),
        }),
        None => Ok(()),
    }
}
