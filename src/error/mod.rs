// Error types for the wiredcache layer
// Author: wiredFRONT contributors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Schema version {stored} is newer than requested version {requested}")]
    SchemaVersion { stored: u32, requested: u32 },

    #[error("Remote message API error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid metadata: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether the error came from the remote API and is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Remote { status, .. } => crate::utils::retry::is_retryable(*status),
            CacheError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
