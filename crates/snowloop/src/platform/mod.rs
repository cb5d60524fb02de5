//! Document platform access.
//!
//! The platform hosts datasets, their items (prompt documents) and the
//! annotations attached to items. Two backends implement [`DocumentPlatform`]:
//! the Dataloop REST gate and an in-memory store.

mod dataloop;
mod error;
mod memory;

pub use dataloop::{DataloopClient, DEFAULT_BASE_URL as DATALOOP_BASE_URL};
pub use error::{PlatformError, PlatformResult};
pub use memory::InMemoryPlatform;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{Annotation, PromptDocument};

/// Item metadata key (under `user`) holding the exported row ID.
pub const ROW_ID_METADATA_KEY: &str = "rowId";

/// A dataset on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Reference to an uploaded item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemHandle {
    pub id: String,
    /// Stored file name, e.g. `42.json`.
    pub name: String,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub metadata: Value,
}

impl ItemHandle {
    /// Row ID recorded in `metadata.user.rowId` at export time.
    pub fn row_id(&self) -> Option<i64> {
        self.metadata
            .get("user")
            .and_then(|u| u.get(ROW_ID_METADATA_KEY))
            .and_then(Value::as_i64)
    }
}

/// User metadata attached to an uploaded prompt document.
pub fn upload_metadata(document: &PromptDocument) -> Value {
    match document.row_id() {
        Some(row_id) => json!({ "user": { ROW_ID_METADATA_KEY: row_id } }),
        None => json!({}),
    }
}

/// Operations the connector needs from the document platform.
#[async_trait]
pub trait DocumentPlatform: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Look up a dataset. Unknown IDs yield [`PlatformError::NotFound`].
    async fn get_dataset(&self, dataset_id: &str) -> PlatformResult<Dataset>;

    /// Upload documents to a dataset in one batch. With `overwrite`, a
    /// document replaces an existing item of the same name.
    ///
    /// Not atomic: backends may upload documents one at a time and stop at
    /// the first failure, so an `Err` can leave earlier documents of the
    /// batch uploaded.
    async fn upload_prompts(
        &self,
        dataset: &Dataset,
        documents: &[PromptDocument],
        overwrite: bool,
    ) -> PlatformResult<Vec<ItemHandle>>;

    /// Fetch an item reference by ID.
    async fn get_item(&self, item_id: &str) -> PlatformResult<ItemHandle>;

    /// Download and parse the prompt structure of an item.
    async fn load_prompt_document(&self, item: &ItemHandle) -> PlatformResult<PromptDocument>;

    /// Annotations of an item in listing order.
    async fn list_annotations(&self, item: &ItemHandle) -> PlatformResult<Vec<Annotation>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;

    #[test]
    fn test_item_handle_row_id() {
        let item: ItemHandle = serde_json::from_value(json!({
            "id": "it-1",
            "name": "42.json",
            "datasetId": "ds-1",
            "metadata": {"system": {}, "user": {"rowId": 42}}
        }))
        .unwrap();
        assert_eq!(item.dataset_id, "ds-1");
        assert_eq!(item.row_id(), Some(42));

        let bare: ItemHandle =
            serde_json::from_value(json!({"id": "it-2", "name": "7.json"})).unwrap();
        assert_eq!(bare.row_id(), None);
    }

    #[test]
    fn test_upload_metadata() {
        let doc = PromptDocument::for_row(&Row::new(9, "q"));
        assert_eq!(upload_metadata(&doc), json!({"user": {"rowId": 9}}));
        assert_eq!(upload_metadata(&PromptDocument::new("x")), json!({}));
    }
}
