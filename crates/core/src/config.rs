//! Config file parsing for `~/.config/epub-normalize/config.toml`.
//!
//! Use `parse_options_from_config` to build parse options from the loaded
//! config so security and image settings apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::readers::ParseOptions;
use crate::security::SecurityLimits;
use crate::structured::DEFAULT_IMAGE_RATIO;

const APP_DIR: &str = "epub-normalize";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseConfig {
    #[serde(default = "default_image_ratio")]
    pub default_image_ratio: f32,
    #[serde(default = "default_true")]
    pub normalize_unicode: bool,
}

fn default_image_ratio() -> f32 {
    DEFAULT_IMAGE_RATIO
}
fn default_true() -> bool {
    true
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            default_image_ratio: DEFAULT_IMAGE_RATIO,
            normalize_unicode: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_file_size_mb: Option<u64>,
    pub max_compression_ratio: Option<u64>,
    pub max_file_count: Option<u64>,
    pub max_nesting_depth: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root directory for `export` when `--out` is not given.
    pub output_dir: Option<String>,
    #[serde(default = "default_true")]
    pub pretty_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            pretty_json: true,
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    path.push(APP_DIR);
    path.push(CONFIG_FILE);
    Ok(path)
}

/// Load config from the default path. A missing or invalid file gives defaults.
pub fn load_config() -> AppConfig {
    let Ok(path) = config_path() else {
        return AppConfig::default();
    };
    match load_config_from(&path) {
        Ok(cfg) => cfg,
        Err(ConfigError::Io(_)) => AppConfig::default(),
        Err(e) => {
            tracing::warn!("Ignoring {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<AppConfig>(&content)?)
}

pub fn save_config(cfg: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Build security limits from config. Uses defaults for any unset values.
pub fn security_limits_from_config(c: &SecurityConfig) -> SecurityLimits {
    let mut limits = SecurityLimits::default();
    if let Some(mb) = c.max_file_size_mb {
        limits.max_total_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    if let Some(n) = c.max_file_count {
        limits.max_file_count = n;
    }
    if let Some(d) = c.max_nesting_depth {
        limits.max_nesting_depth = d;
    }
    limits
}

/// Build parse options from full app config.
pub fn parse_options_from_config(cfg: &AppConfig) -> ParseOptions {
    let ratio = cfg.parse.default_image_ratio;
    ParseOptions {
        security: security_limits_from_config(&cfg.security),
        default_image_ratio: if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            DEFAULT_IMAGE_RATIO
        },
        normalize_unicode: cfg.parse.normalize_unicode,
    }
}

/// Set one `section.key` value.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    fn parsed<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    match key.split_once('.') {
        Some(("parse", "default_image_ratio")) => {
            cfg.parse.default_image_ratio = parsed(key, value)?
        }
        Some(("parse", "normalize_unicode")) => cfg.parse.normalize_unicode = parsed(key, value)?,
        Some(("security", "max_file_size_mb")) => {
            cfg.security.max_file_size_mb = Some(parsed(key, value)?)
        }
        Some(("security", "max_compression_ratio")) => {
            cfg.security.max_compression_ratio = Some(parsed(key, value)?)
        }
        Some(("security", "max_file_count")) => {
            cfg.security.max_file_count = Some(parsed(key, value)?)
        }
        Some(("security", "max_nesting_depth")) => {
            cfg.security.max_nesting_depth = Some(parsed(key, value)?)
        }
        Some(("export", "output_dir")) => cfg.export.output_dir = Some(value.to_string()),
        Some(("export", "pretty_json")) => cfg.export.pretty_json = parsed(key, value)?,
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}
