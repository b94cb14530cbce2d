//! Common error types for wsl-secret-service.

use thiserror::Error;

/// Top-level error type shared by the library crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Metadata store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// Credential backend operation failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Requested entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Secret payload exceeds the backend size limit.
    #[error("secret too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error is the backend's not-found class.
    ///
    /// Best-effort deletes swallow exactly this class and surface
    /// everything else.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
