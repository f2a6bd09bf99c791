//! The Remote Data Gateway: a typed request/response contract over the
//! external file and collection API.
//!
//! The view model only ever talks to `dyn RemoteGateway`, so the HTTP client
//! can be swapped for an in-memory double in tests.

pub mod http;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::{
    Collection, CollectionDetail, FileId, FileRecord, FileSnapshot, FileUpdate, NewCollection,
    SearchRequest, UploadRequest,
};

pub use http::HttpGateway;

/// Failures reported by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a response (connect error, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The addressed file or collection does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service is unreachable for a reason not covered above.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Defines the operations consumed from the remote API.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_files(&self, user_id: &str) -> Result<FileSnapshot, GatewayError>;

    async fn search_files(&self, request: &SearchRequest) -> Result<Vec<FileRecord>, GatewayError>;

    async fn upload_file(&self, request: UploadRequest) -> Result<FileRecord, GatewayError>;

    async fn update_file(
        &self,
        file_id: &FileId,
        update: &FileUpdate,
    ) -> Result<FileRecord, GatewayError>;

    async fn delete_file(&self, file_id: &FileId) -> Result<(), GatewayError>;

    async fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>, GatewayError>;

    /// Fetches a collection with its member files. Opening a collection the
    /// caller does not own subscribes them server-side.
    async fn get_collection_detail(
        &self,
        collection_id: &str,
    ) -> Result<CollectionDetail, GatewayError>;

    /// Replaces the membership of a collection wholesale.
    async fn replace_collection_files(
        &self,
        collection_id: &str,
        file_ids: &BTreeSet<FileId>,
    ) -> Result<(), GatewayError>;

    async fn create_collection(&self, request: &NewCollection) -> Result<Collection, GatewayError>;
}
