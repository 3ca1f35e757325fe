use std::path::PathBuf;

use otapay_manifest::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("image for partition {partition} not found: {}", path.display())]
    InputNotFound { partition: String, path: PathBuf },

    #[error("failed to read image for partition {partition} from {}: {source}", path.display())]
    ReadFailure {
        partition: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest encoding failed: {0}")]
    EncodingFailure(String),

    #[error(
        "failed to write {phase}{} to {}: {source}",
        partition.as_deref().map(|p| format!(" of partition {p}")).unwrap_or_default(),
        path.display()
    )]
    WriteFailure {
        phase: &'static str,
        partition: Option<String>,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid partition specification: {0}")]
    InvalidSpecification(String),

    #[error("invalid payload magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u64),

    #[error("payload truncated: {0}")]
    Truncated(String),

    #[error("failed to decode manifest: {0}")]
    ManifestDecode(#[source] ManifestError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PayloadResult<T> = Result<T, PayloadError>;
