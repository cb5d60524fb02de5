//! Best-response writeback into the source table.

use std::sync::Arc;

use tracing::{error, info, warn, Instrument, Span};

use snowloop::models::{Annotation, PROMPT_FILE_SUFFIX};
use snowloop::platform::{DocumentPlatform, ItemHandle};
use snowloop::warehouse::{
    ConnectionProvider, SqlValue, WarehouseCoordinates, WarehouseResult, WarehouseSession,
};

use super::types::{check_table_name, SyncError, SyncResult};

/// Row ID an item was exported from.
///
/// Prefers the `rowId` recorded in the item's user metadata. Items without it
/// fall back to their name, which must be `<integer>.json`.
pub fn row_id_for(item: &ItemHandle) -> SyncResult<i64> {
    if let Some(row_id) = item.row_id() {
        return Ok(row_id);
    }
    item.name
        .strip_suffix(PROMPT_FILE_SUFFIX)
        .and_then(|stem| stem.parse::<i64>().ok())
        .ok_or_else(|| SyncError::MalformedIdentifier(item.name.clone()))
}

/// Writes the best annotated response of an item back to its table row.
pub struct ResponseWriteback {
    provider: ConnectionProvider,
    platform: Arc<dyn DocumentPlatform>,
    span: Span,
    strict_table_names: bool,
}

impl ResponseWriteback {
    pub fn new(provider: ConnectionProvider, platform: Arc<dyn DocumentPlatform>) -> Self {
        Self {
            provider,
            platform,
            span: tracing::info_span!("writeback"),
            strict_table_names: false,
        }
    }

    /// Log under `span` instead of the default `writeback` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn strict_table_names(mut self, strict: bool) -> Self {
        self.strict_table_names = strict;
        self
    }

    /// Store the best response for the item's first prompt in the `RESPONSE`
    /// column of its row.
    ///
    /// Returns `Ok(None)` without touching the warehouse when no annotation is
    /// marked best for that prompt.
    pub async fn update_table(
        &self,
        item: &ItemHandle,
        coordinates: &WarehouseCoordinates,
        table_name: &str,
    ) -> SyncResult<Option<ItemHandle>> {
        self.update(item, coordinates, table_name)
            .instrument(self.span.clone())
            .await
    }

    async fn update(
        &self,
        item: &ItemHandle,
        coordinates: &WarehouseCoordinates,
        table_name: &str,
    ) -> SyncResult<Option<ItemHandle>> {
        let Some(best) = self.best_response(item).await? else {
            error!("No best response found for item {}", item.id);
            return Ok(None);
        };
        let row_id = row_id_for(item)?;
        check_table_name(table_name, self.strict_table_names)?;

        let sql = format!("UPDATE {} SET RESPONSE = ? WHERE ID = ?", table_name);
        let params = [SqlValue::Text(best.response_value()), SqlValue::Integer(row_id)];

        let mut session = self.provider.connect(coordinates).await?;
        let result = execute_and_commit(session.as_mut(), &sql, &params).await;
        let closed = session.close().await;
        if let (Err(_), Err(e)) = (&result, &closed) {
            warn!("Failed to close warehouse session: {}", e);
        }

        let affected = result?;
        closed?;
        if affected == 0 {
            warn!("No row with ID {} in {}", row_id, table_name);
        }
        info!("Successfully updated row {} in {}", row_id, table_name);
        Ok(Some(item.clone()))
    }

    /// First annotation in listing order marked best for the first prompt.
    /// A selected annotation with null coordinates counts as no response;
    /// later annotations are not considered.
    async fn best_response(&self, item: &ItemHandle) -> SyncResult<Option<Annotation>> {
        let document = self.platform.load_prompt_document(item).await?;
        let Some(key) = document.first_prompt_key() else {
            warn!("Item {} has no prompts", item.id);
            return Ok(None);
        };

        let annotations = self.platform.list_annotations(item).await?;
        Ok(annotations
            .into_iter()
            .find(|a| a.is_best_for(key))
            .filter(|a| !a.coordinates.is_null()))
    }
}

async fn execute_and_commit(
    session: &mut dyn WarehouseSession,
    sql: &str,
    params: &[SqlValue],
) -> WarehouseResult<u64> {
    let affected = session.execute(sql, params).await?;
    session.commit().await?;
    Ok(affected)
}
