//! Warehouse table to prompt dataset export.

use std::sync::Arc;

use tracing::{error, info, warn, Instrument, Span};

use snowloop::models::{PromptDocument, Row};
use snowloop::platform::{DocumentPlatform, ItemHandle, PlatformError};
use snowloop::warehouse::{ConnectionProvider, WarehouseCoordinates};

use super::types::{check_table_name, SyncError, SyncResult};

/// Exports every row of a table as a prompt document.
pub struct TableExporter {
    provider: ConnectionProvider,
    platform: Arc<dyn DocumentPlatform>,
    span: Span,
    strict_table_names: bool,
}

impl TableExporter {
    pub fn new(provider: ConnectionProvider, platform: Arc<dyn DocumentPlatform>) -> Self {
        Self {
            provider,
            platform,
            span: tracing::info_span!("exporter"),
            strict_table_names: false,
        }
    }

    /// Log under `span` instead of the default `exporter` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn strict_table_names(mut self, strict: bool) -> Self {
        self.strict_table_names = strict;
        self
    }

    /// Upload one prompt document per row of `table_name` into the dataset,
    /// replacing items of the same name.
    ///
    /// Returns `Ok(None)` when the dataset does not exist; the warehouse is
    /// not contacted in that case.
    pub async fn table_to_dataset(
        &self,
        coordinates: &WarehouseCoordinates,
        table_name: &str,
        dataset_id: &str,
    ) -> SyncResult<Option<Vec<ItemHandle>>> {
        self.export(coordinates, table_name, dataset_id)
            .instrument(self.span.clone())
            .await
    }

    async fn export(
        &self,
        coordinates: &WarehouseCoordinates,
        table_name: &str,
        dataset_id: &str,
    ) -> SyncResult<Option<Vec<ItemHandle>>> {
        let dataset = match self.platform.get_dataset(dataset_id).await {
            Ok(dataset) => dataset,
            Err(PlatformError::NotFound(_)) => {
                error!("Failed to get dataset: {}", dataset_id);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        check_table_name(table_name, self.strict_table_names)?;

        let rows = self.fetch_rows(coordinates, table_name).await?;
        let documents: Vec<PromptDocument> = rows.iter().map(PromptDocument::for_row).collect();
        if documents.is_empty() {
            info!("Table {} is empty, nothing to upload", table_name);
            return Ok(Some(Vec::new()));
        }

        let items = self
            .platform
            .upload_prompts(&dataset, &documents, true)
            .await?;
        info!(
            "Successfully uploaded {} items to dataset {}",
            items.len(),
            dataset.id
        );
        Ok(Some(items))
    }

    /// Read the whole table. The session is closed before returning, also
    /// when the query fails.
    async fn fetch_rows(
        &self,
        coordinates: &WarehouseCoordinates,
        table_name: &str,
    ) -> SyncResult<Vec<Row>> {
        let mut session = self.provider.connect(coordinates).await?;
        let result = session.query(&format!("SELECT * FROM {}", table_name)).await;
        let closed = session.close().await;
        if let (Err(_), Err(e)) = (&result, &closed) {
            warn!("Failed to close warehouse session: {}", e);
        }

        let result_set = result?;
        closed?;
        info!("Fetched {} rows from {}", result_set.len(), table_name);

        result_set
            .to_rows()
            .map_err(|source| SyncError::MalformedRow {
                table: table_name.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowloop::models::TEXT_MIMETYPE;
    use snowloop::platform::InMemoryPlatform;
    use snowloop::warehouse::{InMemoryWarehouse, ResultSet};

    fn coords() -> WarehouseCoordinates {
        WarehouseCoordinates {
            account: "acct".into(),
            user: "loader".into(),
            warehouse: "WH".into(),
            database: "DB".into(),
            schema: "PUBLIC".into(),
        }
    }

    async fn setup(rows: &[Row]) -> (InMemoryWarehouse, InMemoryPlatform, TableExporter) {
        let warehouse = InMemoryWarehouse::new();
        warehouse.create_prompt_table("PROMPTS", rows).await;
        let platform = InMemoryPlatform::new();
        platform.add_dataset("ds-1", "prompts").await;
        let exporter = TableExporter::new(
            ConnectionProvider::new(Arc::new(warehouse.clone())),
            Arc::new(platform.clone()),
        );
        (warehouse, platform, exporter)
    }

    #[tokio::test]
    async fn test_one_document_per_row() {
        let (warehouse, platform, exporter) =
            setup(&[Row::new(1, "first"), Row::new(2, "second")]).await;

        let items = exporter
            .table_to_dataset(&coords(), "PROMPTS", "ds-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "1.json");
        assert_eq!(items[1].name, "2.json");
        assert_eq!(platform.upload_calls().await, 1);
        assert_eq!(warehouse.queries().await, vec!["SELECT * FROM PROMPTS"]);
        assert_eq!(warehouse.sessions_closed().await, 1);

        let doc = platform.load_prompt_document(&items[1]).await.unwrap();
        assert_eq!(doc.prompts().len(), 1);
        let content = &doc.prompts()[0].content;
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].mimetype, TEXT_MIMETYPE);
        assert_eq!(content[0].value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_null_prompt_is_uploaded_empty() {
        let row = Row {
            id: 5,
            prompt: None,
            response: None,
        };
        let (_, platform, exporter) = setup(&[row]).await;

        let items = exporter
            .table_to_dataset(&coords(), "PROMPTS", "ds-1")
            .await
            .unwrap()
            .unwrap();
        let doc = platform.load_prompt_document(&items[0]).await.unwrap();
        assert_eq!(doc.prompts()[0].content[0].value, None);
    }

    #[tokio::test]
    async fn test_empty_table_skips_upload() {
        let (warehouse, platform, exporter) = setup(&[]).await;

        let items = exporter
            .table_to_dataset(&coords(), "PROMPTS", "ds-1")
            .await
            .unwrap();

        assert_eq!(items, Some(Vec::new()));
        assert_eq!(platform.upload_calls().await, 0);
        assert_eq!(warehouse.sessions_closed().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_dataset_opens_no_session() {
        let (warehouse, platform, exporter) = setup(&[Row::new(1, "a")]).await;

        let items = exporter
            .table_to_dataset(&coords(), "PROMPTS", "missing")
            .await
            .unwrap();

        assert!(items.is_none());
        assert_eq!(warehouse.sessions_opened().await, 0);
        assert!(warehouse.queries().await.is_empty());
        assert_eq!(platform.upload_calls().await, 0);
    }

    #[tokio::test]
    async fn test_session_closed_after_failed_query() {
        let (warehouse, platform, exporter) = setup(&[Row::new(1, "a")]).await;

        let err = exporter
            .table_to_dataset(&coords(), "NO_SUCH_TABLE", "ds-1")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Warehouse(_)));
        assert_eq!(warehouse.sessions_opened().await, 1);
        assert_eq!(warehouse.sessions_closed().await, 1);
        assert_eq!(platform.upload_calls().await, 0);
    }

    #[tokio::test]
    async fn test_table_without_id_column_is_malformed() {
        let (warehouse, _, exporter) = setup(&[]).await;
        let mut table = ResultSet::new(vec!["PROMPT".into()]);
        table.rows.push(vec![Some("orphan".into())]);
        warehouse.create_table("NO_IDS", table).await;

        let err = exporter
            .table_to_dataset(&coords(), "NO_IDS", "ds-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedRow { ref table, .. } if table == "NO_IDS"));
    }

    #[tokio::test]
    async fn test_strict_table_names() {
        let (warehouse, _, exporter) = setup(&[Row::new(1, "a")]).await;
        let exporter = exporter.strict_table_names(true);

        let err = exporter
            .table_to_dataset(&coords(), "PROMPTS; DROP TABLE PROMPTS", "ds-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidTableName(_)));
        assert_eq!(warehouse.sessions_opened().await, 0);

        let items = exporter
            .table_to_dataset(&coords(), "PROMPTS", "ds-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(items.len(), 1);
    }
}
