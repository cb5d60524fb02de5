//! Dataloop REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{
    upload_metadata, Dataset, DocumentPlatform, ItemHandle, PlatformError, PlatformResult,
};
use crate::models::{Annotation, PromptDocument};

/// Default gate endpoint.
pub const DEFAULT_BASE_URL: &str = "https://gate.dataloop.ai/api/v1";

/// Annotation listings come back either bare or wrapped in a page object.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationListing {
    Bare(Vec<Annotation>),
    Paged { items: Vec<Annotation> },
}

impl AnnotationListing {
    fn into_vec(self) -> Vec<Annotation> {
        match self {
            AnnotationListing::Bare(items) | AnnotationListing::Paged { items } => items,
        }
    }
}

/// Client for the Dataloop gate API.
#[derive(Clone)]
pub struct DataloopClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DataloopClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> PlatformResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PlatformError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map error statuses; `what` names the resource for not-found errors.
    async fn check(resp: Response, what: &str) -> PlatformResult<Response> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    async fn upload_one(
        &self,
        dataset: &Dataset,
        document: &PromptDocument,
        overwrite: bool,
    ) -> PlatformResult<ItemHandle> {
        let filename = document.filename();
        let body = serde_json::to_vec(&document.to_json())?;
        let part = Part::bytes(body)
            .file_name(filename.clone())
            .mime_str("application/json")?;
        let form = Form::new()
            .part("file", part)
            .text("path", format!("/{}", filename))
            .text("overwrite", overwrite.to_string())
            .text("metadata", upload_metadata(document).to_string());

        let resp = self
            .request(Method::POST, &format!("/datasets/{}/items", dataset.id))
            .multipart(form)
            .send()
            .await?;
        let resp = Self::check(resp, &format!("dataset {}", dataset.id)).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl DocumentPlatform for DataloopClient {
    fn name(&self) -> &'static str {
        "Dataloop"
    }

    async fn get_dataset(&self, dataset_id: &str) -> PlatformResult<Dataset> {
        let resp = self
            .request(Method::GET, &format!("/datasets/{}", dataset_id))
            .send()
            .await?;
        let resp = Self::check(resp, &format!("dataset {}", dataset_id)).await?;
        Ok(resp.json().await?)
    }

    async fn upload_prompts(
        &self,
        dataset: &Dataset,
        documents: &[PromptDocument],
        overwrite: bool,
    ) -> PlatformResult<Vec<ItemHandle>> {
        let mut items = Vec::with_capacity(documents.len());
        for document in documents {
            items.push(self.upload_one(dataset, document, overwrite).await?);
        }
        Ok(items)
    }

    async fn get_item(&self, item_id: &str) -> PlatformResult<ItemHandle> {
        let resp = self
            .request(Method::GET, &format!("/items/{}", item_id))
            .send()
            .await?;
        let resp = Self::check(resp, &format!("item {}", item_id)).await?;
        Ok(resp.json().await?)
    }

    async fn load_prompt_document(&self, item: &ItemHandle) -> PlatformResult<PromptDocument> {
        let resp = self
            .request(Method::GET, &format!("/items/{}/stream", item.id))
            .send()
            .await?;
        let resp = Self::check(resp, &format!("item {}", item.id)).await?;
        let bytes = resp.bytes().await?;
        let document = PromptDocument::from_json(item.name.clone(), &bytes)?;
        Ok(match item.row_id() {
            Some(row_id) => document.with_row_id(row_id),
            None => document,
        })
    }

    async fn list_annotations(&self, item: &ItemHandle) -> PlatformResult<Vec<Annotation>> {
        let resp = self
            .request(Method::GET, &format!("/items/{}/annotations", item.id))
            .send()
            .await?;
        let resp = Self::check(resp, &format!("item {}", item.id)).await?;
        let listing: AnnotationListing = resp.json().await?;
        Ok(listing.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotation_listing_shapes() {
        let ann = json!({
            "id": "a1",
            "coordinates": "resp",
            "metadata": {"system": {"promptId": "1", "attributes": {"isBest": true}}}
        });
        let bare: AnnotationListing = serde_json::from_value(json!([ann.clone()])).unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let paged: AnnotationListing =
            serde_json::from_value(json!({"items": [ann], "totalItemsCount": 1})).unwrap();
        let items = paged.into_vec();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_best);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = DataloopClient::new("https://gate.example/api/v1/", None, None).unwrap();
        assert_eq!(client.base_url, "https://gate.example/api/v1");
    }
}
