//! Error types for inj-points

use thiserror::Error;

/// Errors raised while validating or persisting a request
#[derive(Debug, Error)]
pub enum PointsError {
    #[error("Invalid address")]
    InvalidAddress,

    #[error("Empty body")]
    EmptyBody,

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unsupported document version: {0}")]
    UnsupportedVersion(u64),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a document store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document key: {0}")]
    InvalidKey(String),

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}
