//! Common error types for the Clinical Data Dictionary

use thiserror::Error;

/// Common result type for CDD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by CDD crates
#[derive(Error, Debug)]
pub enum Error {
    /// Persistent store operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
