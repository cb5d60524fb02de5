//! Table export command.

use snowloop::config::Settings;
use snowloop::warehouse::WarehouseCoordinates;
use snowloop_sync::TableExporter;

use super::helpers::{connection_provider, platform};
use crate::cli::icons::{dim_arrow, success};

/// Upload every row of `table` as a prompt item into `dataset_id`.
pub async fn cmd_export(
    settings: &Settings,
    coordinates: &WarehouseCoordinates,
    table: &str,
    dataset_id: &str,
) -> anyhow::Result<()> {
    let exporter = TableExporter::new(connection_provider(settings)?, platform(settings)?)
        .strict_table_names(settings.strict_table_names);

    let Some(items) = exporter
        .table_to_dataset(coordinates, table, dataset_id)
        .await?
    else {
        anyhow::bail!("Dataset not found: {}", dataset_id);
    };

    eprintln!(
        "{} Exported {} rows from {} to dataset {}",
        success(),
        items.len(),
        table,
        dataset_id
    );
    for item in &items {
        eprintln!("  {} {} ({})", dim_arrow(), item.name, item.id);
    }
    Ok(())
}
