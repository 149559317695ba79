//! SDK error types.

use thiserror::Error;

/// Errors surfaced by the SDK.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Api { code: String, message: String },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Stable error code, mirroring the server's codes where one applies.
    pub fn code(&self) -> &str {
        match self {
            Self::Api { code, .. } => code,
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Http(_) | Self::Io(_) | Self::InvalidResponse(_) => "internal",
        }
    }
}

/// Result type for SDK operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
