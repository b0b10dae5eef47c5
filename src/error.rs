//! Error types for realm-gate

use std::io;

use thiserror::Error;

/// Result type alias for realm-gate
pub type Result<T> = std::result::Result<T, Error>;

/// realm-gate errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity provider discovery or key loading failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Signing key could not be parsed
    #[error("Invalid signing key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
