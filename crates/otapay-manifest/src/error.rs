use thiserror::Error;

/// Errors produced by manifest encoding, decoding, and digest parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("manifest schema violation in {field}: {reason}")]
    Schema { field: &'static str, reason: String },

    #[error("failed to decode manifest: {0}")]
    Decode(#[from] prost::DecodeError),
}
