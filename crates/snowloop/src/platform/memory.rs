//! In-memory document platform.
//!
//! Keeps datasets, items and annotations in process memory with the same
//! overwrite-by-name semantics as the real platform. Upload calls are counted
//! so callers can assert how often the platform was hit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    upload_metadata, Dataset, DocumentPlatform, ItemHandle, PlatformError, PlatformResult,
};
use crate::models::{Annotation, PromptDocument};

#[derive(Debug)]
struct StoredItem {
    handle: ItemHandle,
    /// Serialized prompt file as it would be downloaded.
    content: Vec<u8>,
    annotations: Vec<Annotation>,
}

#[derive(Debug, Default)]
struct State {
    datasets: HashMap<String, Dataset>,
    /// Upload order.
    items: Vec<StoredItem>,
    upload_calls: usize,
}

impl State {
    fn item(&self, item_id: &str) -> PlatformResult<&StoredItem> {
        self.items
            .iter()
            .find(|i| i.handle.id == item_id)
            .ok_or_else(|| PlatformError::NotFound(format!("item {}", item_id)))
    }
}

/// In-memory document platform.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    state: Arc<RwLock<State>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_dataset(&self, id: &str, name: &str) -> Dataset {
        let dataset = Dataset {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.state
            .write()
            .await
            .datasets
            .insert(id.to_string(), dataset.clone());
        dataset
    }

    /// Store a raw item, bypassing upload. Useful for items whose content was
    /// produced elsewhere (e.g. by an older exporter).
    pub async fn add_item(&self, dataset_id: &str, name: &str, content: Vec<u8>) -> ItemHandle {
        let handle = ItemHandle {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            dataset_id: dataset_id.to_string(),
            metadata: serde_json::json!({}),
        };
        self.state.write().await.items.push(StoredItem {
            handle: handle.clone(),
            content,
            annotations: Vec::new(),
        });
        handle
    }

    /// Attach an annotation; listing order follows insertion order.
    pub async fn add_annotation(&self, item_id: &str, annotation: Annotation) -> PlatformResult<()> {
        let mut state = self.state.write().await;
        let item = state
            .items
            .iter_mut()
            .find(|i| i.handle.id == item_id)
            .ok_or_else(|| PlatformError::NotFound(format!("item {}", item_id)))?;
        item.annotations.push(annotation);
        Ok(())
    }

    /// Items of a dataset in upload order.
    pub async fn items(&self, dataset_id: &str) -> Vec<ItemHandle> {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|i| i.handle.dataset_id == dataset_id)
            .map(|i| i.handle.clone())
            .collect()
    }

    pub async fn upload_calls(&self) -> usize {
        self.state.read().await.upload_calls
    }
}

#[async_trait]
impl DocumentPlatform for InMemoryPlatform {
    fn name(&self) -> &'static str {
        "in-memory platform"
    }

    async fn get_dataset(&self, dataset_id: &str) -> PlatformResult<Dataset> {
        self.state
            .read()
            .await
            .datasets
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("dataset {}", dataset_id)))
    }

    async fn upload_prompts(
        &self,
        dataset: &Dataset,
        documents: &[PromptDocument],
        overwrite: bool,
    ) -> PlatformResult<Vec<ItemHandle>> {
        let mut state = self.state.write().await;
        state.upload_calls += 1;
        if !state.datasets.contains_key(&dataset.id) {
            return Err(PlatformError::NotFound(format!("dataset {}", dataset.id)));
        }

        let mut uploaded = Vec::with_capacity(documents.len());
        for document in documents {
            let name = document.filename();
            let content = serde_json::to_vec(&document.to_json())?;
            let metadata = upload_metadata(document);

            let existing = state
                .items
                .iter_mut()
                .find(|i| i.handle.dataset_id == dataset.id && i.handle.name == name);
            match existing {
                Some(item) if overwrite => {
                    item.handle.metadata = metadata;
                    item.content = content;
                    item.annotations.clear();
                    uploaded.push(item.handle.clone());
                }
                Some(item) => uploaded.push(item.handle.clone()),
                None => {
                    let handle = ItemHandle {
                        id: Uuid::new_v4().to_string(),
                        name,
                        dataset_id: dataset.id.clone(),
                        metadata,
                    };
                    state.items.push(StoredItem {
                        handle: handle.clone(),
                        content,
                        annotations: Vec::new(),
                    });
                    uploaded.push(handle);
                }
            }
        }
        Ok(uploaded)
    }

    async fn get_item(&self, item_id: &str) -> PlatformResult<ItemHandle> {
        Ok(self.state.read().await.item(item_id)?.handle.clone())
    }

    async fn load_prompt_document(&self, item: &ItemHandle) -> PlatformResult<PromptDocument> {
        let state = self.state.read().await;
        let stored = state.item(&item.id)?;
        let document = PromptDocument::from_json(stored.handle.name.clone(), &stored.content)?;
        Ok(match stored.handle.row_id() {
            Some(row_id) => document.with_row_id(row_id),
            None => document,
        })
    }

    async fn list_annotations(&self, item: &ItemHandle) -> PlatformResult<Vec<Annotation>> {
        Ok(self.state.read().await.item(&item.id)?.annotations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;

    #[tokio::test]
    async fn test_upload_overwrites_by_name() {
        let platform = InMemoryPlatform::new();
        let dataset = platform.add_dataset("ds", "prompts").await;

        let first = platform
            .upload_prompts(&dataset, &[PromptDocument::for_row(&Row::new(1, "old"))], true)
            .await
            .unwrap();
        platform
            .add_annotation(&first[0].id, Annotation::new("a", "x".into()))
            .await
            .unwrap();

        let second = platform
            .upload_prompts(&dataset, &[PromptDocument::for_row(&Row::new(1, "new"))], true)
            .await
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(platform.items("ds").await.len(), 1);
        assert_eq!(platform.upload_calls().await, 2);
        assert!(platform.list_annotations(&second[0]).await.unwrap().is_empty());

        let doc = platform.load_prompt_document(&second[0]).await.unwrap();
        assert_eq!(doc.name(), "1.json");
        assert_eq!(doc.row_id(), Some(1));
        assert_eq!(doc.prompts()[0].content[0].value.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_upload_without_overwrite_keeps_existing() {
        let platform = InMemoryPlatform::new();
        let dataset = platform.add_dataset("ds", "prompts").await;
        platform
            .upload_prompts(&dataset, &[PromptDocument::for_row(&Row::new(1, "old"))], false)
            .await
            .unwrap();
        let items = platform
            .upload_prompts(&dataset, &[PromptDocument::for_row(&Row::new(1, "new"))], false)
            .await
            .unwrap();
        let doc = platform.load_prompt_document(&items[0]).await.unwrap();
        assert_eq!(doc.prompts()[0].content[0].value.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let platform = InMemoryPlatform::new();
        assert!(matches!(
            platform.get_dataset("nope").await,
            Err(PlatformError::NotFound(_))
        ));
        assert!(matches!(
            platform.get_item("nope").await,
            Err(PlatformError::NotFound(_))
        ));
    }
}
