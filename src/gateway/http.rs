//! `reqwest`-backed implementation of the remote gateway.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::{GatewayError, RemoteGateway};
use crate::config::ClientConfig;
use crate::core::file_kind::{content_type_for, extension_of};
use crate::core::{
    Collection, CollectionDetail, FileId, FileRecord, FileSnapshot, FileUpdate, NewCollection,
    SearchRequest, SearchResponse, UploadRequest,
};

/// Tunnelling proxies in front of the API serve an interstitial page unless
/// this header is present.
const BROWSER_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// The upload endpoint answers with a summary rather than a full record.
#[derive(Deserialize, Debug)]
struct UploadResponse {
    #[serde(alias = "id")]
    file_id: FileId,
    #[serde(default)]
    url: String,
    filename: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "detail_summary")]
    summary: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
}

#[derive(Serialize)]
struct ReplaceFilesBody<'a> {
    file_ids: &'a BTreeSet<FileId>,
}

pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            GatewayError::Unavailable(format!("Invalid API URL '{}': {}", config.api_base_url, e))
        })?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if config.skip_browser_warning {
            default_headers.insert(BROWSER_WARNING_HEADER, HeaderValue::from_static("true"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(default_headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Builds an endpoint URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Unavailable(format!("API URL '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response, what: &str) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(what.to_string()));
        }
        tracing::error!("Gateway call for {} failed with {}: {}", what, status, message);
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, GatewayError> {
        let response = Self::check(response, what).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_files(&self, user_id: &str) -> Result<FileSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "files", user_id])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response, "file listing").await
    }

    async fn search_files(&self, request: &SearchRequest) -> Result<Vec<FileRecord>, GatewayError> {
        let url = self.endpoint(&["api", "search"])?;
        let response = self.client.post(url).json(request).send().await?;
        let body: SearchResponse = Self::decode(response, "search").await?;
        Ok(body.results)
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<FileRecord, GatewayError> {
        let url = self.endpoint(&["api", "upload"])?;
        let mime = content_type_for(&request.filename);
        let part = reqwest::multipart::Part::bytes(request.bytes)
            .file_name(request.filename.clone())
            .mime_str(&mime)?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("user_id", request.user_id.clone());
        if let Some(group_id) = &request.group_id {
            form = form.text("group_id", group_id.clone());
        }

        let response = self.client.post(url).multipart(form).send().await?;
        let uploaded: UploadResponse = Self::decode(response, "upload").await?;

        let file_type = uploaded
            .file_type
            .or_else(|| extension_of(&uploaded.filename))
            .unwrap_or_default();
        Ok(FileRecord {
            id: uploaded.file_id,
            filename: uploaded.filename,
            file_type,
            tags: uploaded.tags,
            owner_id: request.user_id,
            group_id: request.group_id,
            upload_date: None,
            url: uploaded.url,
            detail_summary: uploaded.summary,
        })
    }

    async fn update_file(
        &self,
        file_id: &FileId,
        update: &FileUpdate,
    ) -> Result<FileRecord, GatewayError> {
        let url = self.endpoint(&["api", "files", file_id.as_str()])?;
        let response = self.client.put(url).json(update).send().await?;
        Self::decode(response, &format!("file {}", file_id)).await
    }

    async fn delete_file(&self, file_id: &FileId) -> Result<(), GatewayError> {
        let url = self.endpoint(&["api", "files", file_id.as_str()])?;
        let response = self.client.delete(url).send().await?;
        Self::check(response, &format!("file {}", file_id)).await?;
        Ok(())
    }

    async fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>, GatewayError> {
        let url = self.endpoint(&["api", "collections", user_id])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response, "collection listing").await
    }

    async fn get_collection_detail(
        &self,
        collection_id: &str,
    ) -> Result<CollectionDetail, GatewayError> {
        let url = self.endpoint(&["api", "collections", "detail", collection_id])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response, &format!("collection {}", collection_id)).await
    }

    async fn replace_collection_files(
        &self,
        collection_id: &str,
        file_ids: &BTreeSet<FileId>,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["api", "collections", collection_id, "files"])?;
        let response = self
            .client
            .put(url)
            .json(&ReplaceFilesBody { file_ids })
            .send()
            .await?;
        Self::check(response, &format!("collection {}", collection_id)).await?;
        Ok(())
    }

    async fn create_collection(&self, request: &NewCollection) -> Result<Collection, GatewayError> {
        let url = self.endpoint(&["api", "collections"])?;
        let response = self.client.post(url).json(request).send().await?;
        Self::decode(response, "new collection").await
    }
}
