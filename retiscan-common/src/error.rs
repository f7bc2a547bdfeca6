//! Shared error type for Retiscan

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared model, config and local database code
#[derive(Error, Debug)]
pub enum Error {
    /// Local SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column or session file could not be (de)serialized
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config unreadable or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Value outside the domain model (bad class index, score out of [0,1], ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
