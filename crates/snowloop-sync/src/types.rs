//! Types shared by the sync services.

use thiserror::Error;

use snowloop::models::RowError;
use snowloop::platform::PlatformError;
use snowloop::utils::is_valid_table_identifier;
use snowloop::warehouse::WarehouseError;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors from the sync services.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Cannot derive a row ID from item name {0:?}")]
    MalformedIdentifier(String),

    #[error("Malformed row in table {table}: {source}")]
    MalformedRow {
        table: String,
        #[source]
        source: RowError,
    },

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),
}

/// Reject table names that are not plain (optionally qualified) identifiers
/// when `strict` is set. Without it the name is interpolated as given.
pub(crate) fn check_table_name(table_name: &str, strict: bool) -> SyncResult<()> {
    if strict && !is_valid_table_identifier(table_name) {
        return Err(SyncError::InvalidTableName(table_name.to_string()));
    }
    Ok(())
}
