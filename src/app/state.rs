//! Defines the central, mutable state of the client.

use std::collections::HashSet;
use std::time::Duration;

use crate::app::selection::SelectionEngine;
use crate::config::ClientConfig;
use crate::core::error::ClientError;
use crate::core::file_kind::KindFilter;
use crate::core::{
    Collection, CollectionDetail, FileId, FileRecord, FileSnapshot, Group, LocalFilter,
};

/// Identifies the request context an async response belongs to.
///
/// A response is applied only if the state still carries the same ticket;
/// anything else means the user moved on and the response is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchTicket {
    pub context_epoch: u64,
    pub generation: u64,
}

/// Holds the complete, mutable state of the client.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so the command handlers and
/// the async tasks they spawn can share it. The lock is never held across a
/// gateway call.
pub struct AppState {
    /// The client configuration.
    pub config: ClientConfig,
    /// The last grouped-file snapshot received from the gateway.
    pub snapshot: FileSnapshot,
    /// `true` once the first snapshot has arrived.
    pub has_loaded: bool,
    /// The folder being viewed, or `None` at the home level.
    pub current_folder: Option<Group>,
    /// The text in the search box. Editing it does not search.
    pub search_query: String,
    /// The query of the last committed search, if it is still in effect.
    pub committed_query: Option<String>,
    /// Results of the last committed search.
    pub search_results: Vec<FileRecord>,
    /// `true` while a search request is in flight.
    pub is_searching: bool,
    /// Local filters: uploader, kind and tag.
    pub filter: LocalFilter,
    /// Multi-select mode and the selected ids.
    pub selection: SelectionEngine,
    /// `true` while a refresh is in flight; the listing may be stale.
    pub is_loading: bool,
    /// Number of uploads still in flight.
    pub uploads_in_flight: usize,
    /// Home-level groups shown in full rather than as a preview.
    pub expanded_groups: HashSet<String>,
    /// The file whose detail view is open.
    pub detail_file: Option<FileRecord>,
    /// `true` while the "add to collection" picker is shown.
    pub merge_picker_open: bool,
    /// The user's collections, as last listed.
    pub collections: Vec<Collection>,
    /// The collection currently opened, with its files.
    pub open_collection: Option<CollectionDetail>,
    /// Bumped on every collection open and close.
    pub collection_generation: u64,
    /// A one-line description of what happened last.
    pub status_message: String,
    /// Bumped on every folder transition.
    pub context_epoch: u64,
    /// Bumped on every search dispatch and every search reset.
    pub search_generation: u64,
    /// Bumped on every refresh dispatch.
    pub refresh_generation: u64,
}

impl Default for AppState {
    /// Creates a default `AppState` instance, loading the configuration from disk.
    fn default() -> Self {
        Self::with_config(ClientConfig::load().unwrap_or_default())
    }
}

impl AppState {
    pub fn with_config(config: ClientConfig) -> Self {
        let selection = SelectionEngine::new(Duration::from_millis(config.long_press_ms));
        Self {
            config,
            snapshot: FileSnapshot::default(),
            has_loaded: false,
            current_folder: None,
            search_query: String::new(),
            committed_query: None,
            search_results: Vec::new(),
            is_searching: false,
            filter: LocalFilter::default(),
            selection,
            is_loading: false,
            uploads_in_flight: 0,
            expanded_groups: HashSet::new(),
            detail_file: None,
            merge_picker_open: false,
            collections: Vec::new(),
            open_collection: None,
            collection_generation: 0,
            status_message: "Ready.".to_string(),
            context_epoch: 0,
            search_generation: 0,
            refresh_generation: 0,
        }
    }

    pub fn user_id(&self) -> Result<String, ClientError> {
        self.config.user_id.clone().ok_or(ClientError::NoUser)
    }

    /// Opens `group` as the current folder and resets the filter state.
    pub fn enter_folder(&mut self, group: Group) {
        tracing::info!("Entering folder '{}'", group.group_name);
        self.current_folder = Some(group);
        self.reset_filter_state();
    }

    /// Returns to the home level and resets the filter state.
    pub fn exit_folder(&mut self) {
        if let Some(folder) = &self.current_folder {
            tracing::info!("Leaving folder '{}'", folder.group_name);
        }
        self.current_folder = None;
        self.reset_filter_state();
    }

    /// Clears query, results and local filters, and invalidates any search
    /// still in flight.
    fn reset_filter_state(&mut self) {
        self.context_epoch += 1;
        self.search_query.clear();
        self.filter = LocalFilter::default();
        self.clear_search();
    }

    /// Drops the committed search and its results.
    pub fn clear_search(&mut self) {
        self.search_generation += 1;
        self.committed_query = None;
        self.search_results.clear();
        self.is_searching = false;
    }

    /// Records a new search dispatch for `query` and returns its ticket.
    pub fn begin_search(&mut self, query: String) -> SearchTicket {
        self.search_generation += 1;
        self.committed_query = Some(query);
        self.is_searching = true;
        self.search_ticket()
    }

    pub fn search_ticket(&self) -> SearchTicket {
        SearchTicket {
            context_epoch: self.context_epoch,
            generation: self.search_generation,
        }
    }

    /// Applies a search response if `ticket` is still current.
    ///
    /// Returns `false` when the response was superseded and discarded.
    pub fn finish_search(
        &mut self,
        ticket: SearchTicket,
        outcome: Result<Vec<FileRecord>, &ClientError>,
    ) -> bool {
        if ticket != self.search_ticket() {
            tracing::warn!("Discarding superseded search response");
            return false;
        }
        self.is_searching = false;
        match outcome {
            Ok(results) => {
                self.status_message = format!("Found {} matching files.", results.len());
                self.search_results = results;
            }
            Err(e) => {
                self.search_results.clear();
                self.status_message = format!("Search failed: {}", e);
            }
        }
        true
    }

    pub fn set_uploader_filter(&mut self, uploader: Option<String>) -> bool {
        let uploader = uploader.filter(|u| !u.trim().is_empty());
        if self.filter.uploader == uploader {
            return false;
        }
        self.filter.uploader = uploader;
        true
    }

    pub fn set_kind_filter(&mut self, kind: KindFilter) {
        self.filter.kind = kind;
    }

    pub fn set_tag_filter(&mut self, tag: Option<String>) {
        self.filter.tag = tag.filter(|t| !t.trim().is_empty());
    }

    /// Installs a fresh snapshot and re-resolves the current folder by name.
    ///
    /// If the folder is gone the view falls back to home and the stale
    /// reference is returned for reporting.
    pub fn apply_snapshot(&mut self, snapshot: FileSnapshot) -> Option<ClientError> {
        self.snapshot = snapshot;
        self.has_loaded = true;
        self.expanded_groups
            .retain(|name| self.snapshot.find_group(name).is_some());

        if let Some(detail) = &self.detail_file {
            self.detail_file = self.snapshot.find_file(&detail.id).cloned();
        }

        let folder_name = self.current_folder.as_ref()?.group_name.clone();
        match self.snapshot.find_group(&folder_name) {
            Some(group) => {
                // Same folder, fresh contents: filters stay as they are.
                self.current_folder = Some(group.clone());
                None
            }
            None => {
                tracing::warn!(
                    "Folder '{}' no longer exists after refresh, returning home",
                    folder_name
                );
                self.exit_folder();
                Some(ClientError::StaleReference {
                    kind: "Group",
                    name: folder_name,
                })
            }
        }
    }

    /// Drops a deleted file from every cached view.
    pub fn forget_file(&mut self, file_id: &FileId) {
        self.selection.remove(file_id);
        self.search_results.retain(|f| &f.id != file_id);
        if self.detail_file.as_ref().is_some_and(|f| &f.id == file_id) {
            self.detail_file = None;
        }
    }

    pub fn toggle_group_expansion(&mut self, group_name: &str) {
        if !self.expanded_groups.remove(group_name) {
            self.expanded_groups.insert(group_name.to_string());
        }
    }

    /// Leaves selection mode and closes the merge picker.
    pub fn cancel_selection(&mut self) {
        self.selection.cancel();
        self.merge_picker_open = false;
    }
}
