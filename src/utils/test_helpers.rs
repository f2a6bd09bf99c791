//! Shared test infrastructure: logging setup and an in-memory gateway.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, Once};
use std::time::Duration;

use crate::core::file_kind::extension_of;
use crate::core::search::SearchEngine;
use crate::core::{
    Collection, CollectionDetail, FileId, FileRecord, FileSnapshot, FileUpdate, Group,
    NewCollection, SearchRequest, UploadRequest, MY_UPLOADS_GROUP,
};
use crate::gateway::{GatewayError, RemoteGateway};

static LOGGING_INIT: Once = Once::new();

/// Initializes the tracing subscriber for tests.
///
/// This function is wrapped in a `Once` block to ensure that the global
/// subscriber is set exactly one time, even when tests are run in parallel.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Builds a minimal PDF record.
pub fn sample_file(id: &str, owner_id: &str, group_id: Option<&str>) -> FileRecord {
    FileRecord {
        id: FileId::from(id),
        filename: format!("{id}.pdf"),
        file_type: "pdf".to_string(),
        tags: Vec::new(),
        owner_id: owner_id.to_string(),
        group_id: group_id.map(str::to_string),
        upload_date: None,
        url: format!("https://files.example/{id}.pdf"),
        detail_summary: None,
    }
}

struct FakeCollection {
    name: String,
    owner_id: String,
    members: BTreeSet<FileId>,
    extra_files: HashMap<FileId, FileRecord>,
}

#[derive(Default)]
struct FakeInner {
    snapshot: FileSnapshot,
    collections: BTreeMap<String, FakeCollection>,
    scripted_search: Option<Vec<FileRecord>>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
    search_requests: Vec<SearchRequest>,
    uploads: Vec<UploadRequest>,
    updates: Vec<(FileId, FileUpdate)>,
    next_id: u64,
}

/// An in-memory `RemoteGateway` that behaves like a small server.
///
/// Operations can be made to fail once (`fail_next`) or to take a while
/// (`set_delay`), and every call is recorded by operation name.
#[derive(Default)]
pub struct FakeGateway {
    inner: Mutex<FakeInner>,
}

impl FakeGateway {
    pub fn with_snapshot(snapshot: FileSnapshot) -> Self {
        let gateway = Self::default();
        gateway.set_snapshot(snapshot);
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeInner> {
        self.inner.lock().expect("fake gateway mutex poisoned")
    }

    pub fn set_snapshot(&self, snapshot: FileSnapshot) {
        self.lock().snapshot = snapshot;
    }

    pub fn snapshot(&self) -> FileSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn add_collection(&self, id: &str, name: &str, owner_id: &str, files: Vec<FileRecord>) {
        let members = files.iter().map(|f| f.id.clone()).collect();
        let extra_files = files.into_iter().map(|f| (f.id.clone(), f)).collect();
        self.lock().collections.insert(
            id.to_string(),
            FakeCollection {
                name: name.to_string(),
                owner_id: owner_id.to_string(),
                members,
                extra_files,
            },
        );
    }

    pub fn set_collection_members(&self, id: &str, members: BTreeSet<FileId>) {
        if let Some(collection) = self.lock().collections.get_mut(id) {
            collection.members = members;
        }
    }

    pub fn collection_members(&self, id: &str) -> Option<BTreeSet<FileId>> {
        self.lock().collections.get(id).map(|c| c.members.clone())
    }

    pub fn remove_collection(&self, id: &str) {
        self.lock().collections.remove(id);
    }

    /// Makes the next call to `operation` fail with a transient error.
    pub fn fail_next(&self, operation: &str) {
        self.lock().failures.insert(operation.to_string());
    }

    /// Delays every call to `operation` by `delay`.
    pub fn set_delay(&self, operation: &str, delay: Duration) {
        self.lock().delays.insert(operation.to_string(), delay);
    }

    /// Calls to `operation` made from now on return without delay.
    pub fn clear_delay(&self, operation: &str) {
        self.lock().delays.remove(operation);
    }

    /// Answers every search with `results` instead of matching the snapshot.
    pub fn set_search_results(&self, results: Vec<FileRecord>) {
        self.lock().scripted_search = Some(results);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.lock().search_requests.clone()
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.lock().uploads.clone()
    }

    pub fn updates(&self) -> Vec<(FileId, FileUpdate)> {
        self.lock().updates.clone()
    }

    async fn begin(&self, operation: &str) -> Result<(), GatewayError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls.push(operation.to_string());
            if inner.failures.remove(operation) {
                return Err(GatewayError::Unavailable(format!("{operation} failed")));
            }
            inner.delays.get(operation).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

fn group_matches(group: &Group, group_id: &str) -> bool {
    group.group_id.as_deref() == Some(group_id)
        || group.files.iter().any(|f| f.group_id.as_deref() == Some(group_id))
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn list_files(&self, _user_id: &str) -> Result<FileSnapshot, GatewayError> {
        self.begin("list_files").await?;
        Ok(self.snapshot())
    }

    async fn search_files(&self, request: &SearchRequest) -> Result<Vec<FileRecord>, GatewayError> {
        self.begin("search_files").await?;
        let mut inner = self.lock();
        inner.search_requests.push(request.clone());
        if let Some(results) = &inner.scripted_search {
            return Ok(results.clone());
        }
        Ok(inner
            .snapshot
            .groups
            .iter()
            .filter(|g| match &request.group_id {
                Some(id) => group_matches(g, id),
                None => true,
            })
            .flat_map(|g| g.files.iter())
            .filter(|f| request.owner_id.as_ref().map_or(true, |o| &f.owner_id == o))
            .filter(|f| SearchEngine::matches_text(f, &request.query))
            .cloned()
            .collect())
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<FileRecord, GatewayError> {
        self.begin("upload_file").await?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let record = FileRecord {
            id: FileId(format!("up-{}", inner.next_id)),
            filename: request.filename.clone(),
            file_type: extension_of(&request.filename).unwrap_or_default(),
            tags: vec!["Uncategorized".to_string()],
            owner_id: request.user_id.clone(),
            group_id: request.group_id.clone(),
            upload_date: None,
            url: String::new(),
            detail_summary: None,
        };

        let groups = &mut inner.snapshot.groups;
        let target = match &request.group_id {
            Some(group_id) => groups.iter().position(|g| group_matches(g, group_id)),
            None => groups.iter().position(|g| g.group_name == MY_UPLOADS_GROUP),
        };
        match target {
            Some(index) => groups[index].files.push(record.clone()),
            None => groups.push(Group {
                group_name: MY_UPLOADS_GROUP.to_string(),
                group_id: None,
                files: vec![record.clone()],
            }),
        }
        inner.uploads.push(request);
        Ok(record)
    }

    async fn update_file(
        &self,
        file_id: &FileId,
        update: &FileUpdate,
    ) -> Result<FileRecord, GatewayError> {
        self.begin("update_file").await?;
        let mut inner = self.lock();
        inner.updates.push((file_id.clone(), update.clone()));
        let record = inner
            .snapshot
            .groups
            .iter_mut()
            .flat_map(|g| g.files.iter_mut())
            .find(|f| &f.id == file_id)
            .ok_or_else(|| GatewayError::NotFound(format!("file {file_id}")))?;
        if let Some(filename) = &update.filename {
            record.filename = filename.clone();
        }
        if let Some(tags) = &update.tags {
            record.tags = tags.clone();
        }
        Ok(record.clone())
    }

    async fn delete_file(&self, file_id: &FileId) -> Result<(), GatewayError> {
        self.begin("delete_file").await?;
        let mut inner = self.lock();
        let mut found = false;
        for group in inner.snapshot.groups.iter_mut() {
            let before = group.files.len();
            group.files.retain(|f| &f.id != file_id);
            found |= group.files.len() != before;
        }
        if !found {
            return Err(GatewayError::NotFound(format!("file {file_id}")));
        }
        // Groups without files are not listed.
        inner.snapshot.groups.retain(|g| !g.files.is_empty());
        Ok(())
    }

    async fn list_collections(&self, user_id: &str) -> Result<Vec<Collection>, GatewayError> {
        self.begin("list_collections").await?;
        Ok(self
            .lock()
            .collections
            .iter()
            .filter(|(_, c)| c.owner_id == user_id)
            .map(|(id, c)| Collection {
                id: id.clone(),
                name: c.name.clone(),
                owner_id: c.owner_id.clone(),
                file_ids: c.members.clone(),
            })
            .collect())
    }

    async fn get_collection_detail(
        &self,
        collection_id: &str,
    ) -> Result<CollectionDetail, GatewayError> {
        self.begin("get_collection_detail").await?;
        let inner = self.lock();
        let collection = inner
            .collections
            .get(collection_id)
            .ok_or_else(|| GatewayError::NotFound(format!("collection {collection_id}")))?;
        let files = collection
            .members
            .iter()
            .map(|id| {
                inner
                    .snapshot
                    .find_file(id)
                    .or_else(|| collection.extra_files.get(id))
                    .cloned()
                    .unwrap_or_else(|| sample_file(id.as_str(), &collection.owner_id, None))
            })
            .collect();
        Ok(CollectionDetail {
            id: collection_id.to_string(),
            name: collection.name.clone(),
            owner_id: collection.owner_id.clone(),
            files,
        })
    }

    async fn replace_collection_files(
        &self,
        collection_id: &str,
        file_ids: &BTreeSet<FileId>,
    ) -> Result<(), GatewayError> {
        self.begin("replace_collection_files").await?;
        let mut inner = self.lock();
        let collection = inner
            .collections
            .get_mut(collection_id)
            .ok_or_else(|| GatewayError::NotFound(format!("collection {collection_id}")))?;
        collection.members = file_ids.clone();
        Ok(())
    }

    async fn create_collection(&self, request: &NewCollection) -> Result<Collection, GatewayError> {
        self.begin("create_collection").await?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("col-{}", inner.next_id);
        inner.collections.insert(
            id.clone(),
            FakeCollection {
                name: request.name.clone(),
                owner_id: request.owner_id.clone(),
                members: BTreeSet::new(),
                extra_files: HashMap::new(),
            },
        );
        Ok(Collection {
            id,
            name: request.name.clone(),
            owner_id: request.owner_id.clone(),
            file_ids: BTreeSet::new(),
        })
    }
}
