//! Response writeback command.

use snowloop::config::Settings;
use snowloop::warehouse::WarehouseCoordinates;
use snowloop_sync::ResponseWriteback;

use super::helpers::{connection_provider, platform};
use crate::cli::icons::{success, warn};

/// Write the best response annotated on `item_id` back into `table`.
pub async fn cmd_writeback(
    settings: &Settings,
    coordinates: &WarehouseCoordinates,
    table: &str,
    item_id: &str,
) -> anyhow::Result<()> {
    let platform = platform(settings)?;
    let item = platform.get_item(item_id).await?;

    let writeback = ResponseWriteback::new(connection_provider(settings)?, platform)
        .strict_table_names(settings.strict_table_names);

    match writeback.update_table(&item, coordinates, table).await? {
        Some(item) => eprintln!(
            "{} Wrote best response of {} back to {}",
            success(),
            item.name,
            table
        ),
        None => eprintln!(
            "{} No best response on {}; {} left unchanged",
            warn(),
            item.name,
            table
        ),
    }
    Ok(())
}
