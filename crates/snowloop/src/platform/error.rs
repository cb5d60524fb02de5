//! Document platform error types.

use thiserror::Error;

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Platform returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse platform response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PlatformError::Parse(e.to_string())
        } else {
            PlatformError::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        PlatformError::Parse(e.to_string())
    }
}
