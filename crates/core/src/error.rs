/// Top-level error type for callers that drive both parsing and storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal parse failures. A parse either yields a complete `Book` or one of these.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid ZIP archive: {0}")]
    Archive(String),

    #[error("META-INF/container.xml file missing")]
    MissingContainer,

    #[error("Invalid container.xml file: {0}")]
    InvalidContainer(String),

    #[error("Package document missing: {0}")]
    MissingPackageDocument(String),

    #[error("Malformed package document: {0}")]
    PackageDocument(String),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Parse task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ParseError {
    fn from(e: zip::result::ZipError) -> Self {
        ParseError::Archive(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("ZIP bomb detected: decompression ratio {ratio}:1 exceeds limit {limit}:1")]
    ZipBomb { ratio: u64, limit: u64 },

    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("DRM protected file ({drm_type})")]
    DrmProtected { drm_type: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Refusing to write outside the book folder: {0}")]
    UnsafePath(String),

    #[error("Failed to serialize book record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid config file: {0}")]
    Invalid(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
