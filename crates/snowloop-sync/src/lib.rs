//! Sync services moving data between warehouse tables and prompt datasets.
//!
//! - [`TableExporter`] turns every row of a table into a prompt document and
//!   uploads the batch to a dataset.
//! - [`ResponseWriteback`] takes the best response annotated on an item and
//!   writes it into the `RESPONSE` column of the row it came from.

mod exporter;
mod types;
mod writeback;

pub use exporter::TableExporter;
pub use types::{SyncError, SyncResult};
pub use writeback::{row_id_for, ResponseWriteback};
