//! Book readers and the options they share.

pub mod epub;

pub use epub::EpubReader;

use crate::security::SecurityLimits;
use crate::structured::DEFAULT_IMAGE_RATIO;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub security: SecurityLimits,
    /// Height / width recorded for images whose dimensions cannot be read.
    pub default_image_ratio: f32,
    /// Bring titles, metadata and bodies into Unicode NFC.
    pub normalize_unicode: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            security: SecurityLimits::default(),
            default_image_ratio: DEFAULT_IMAGE_RATIO,
            normalize_unicode: true,
        }
    }
}
