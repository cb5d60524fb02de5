//! Warehouse error types.

use thiserror::Error;

/// Result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Errors from warehouse sessions. None of these are retried.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Unexpected warehouse response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for WarehouseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            WarehouseError::Protocol(e.to_string())
        } else {
            WarehouseError::Connection(e.to_string())
        }
    }
}
