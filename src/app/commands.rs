//! Contains all the command handlers that are callable from the presentation
//! layer via IPC.
//!
//! Each function in this module corresponds to a specific `IpcMessage::command`.
//! Handlers mutate the `AppState`, call the gateway without holding the lock
//! and send `UserEvent`s back to the UI. Failures are reported through
//! `report_error` and never leave the state half-updated.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::events::UserEvent;
use super::helpers::{lock_state, notify, report_error, with_state_and_notify};
use super::merge;
use super::proxy::EventProxy;
use super::selection::{ReleaseOutcome, TapOutcome};
use super::state::AppState;
use super::tasks::{self, refresh_files, run_search};
use crate::config::settings;
use crate::core::error::ClientError;
use crate::core::file_kind::{is_accepted_upload, KindFilter, ACCEPTED_UPLOAD_EXTENSIONS};
use crate::core::normalize::{parse_tags, sanitize_filename};
use crate::core::{FileId, FileRecord, FileUpdate, NewCollection, UploadRequest};
use crate::gateway::{GatewayError, RemoteGateway};

/// Sends the initial state and loads files and collections.
pub async fn initialize<P: EventProxy>(
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    {
        let state_guard = lock_state(&state);
        notify(&proxy, &state_guard);
    }
    refresh(gateway, proxy.clone(), state.clone()).await;
    load_collections(gateway, proxy, state).await;
}

/// Re-fetches the grouped file snapshot.
pub async fn refresh<P: EventProxy>(
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Err(e) = refresh_files(gateway, &proxy, &state).await {
        report_error(&state, &proxy, "Refresh", &e);
    }
}

/// Opens the folder named `group_name` from the current snapshot.
pub fn enter_folder<P: EventProxy>(group_name: &str, proxy: P, state: Arc<Mutex<AppState>>) {
    let group = lock_state(&state).snapshot.find_group(group_name).cloned();
    match group {
        Some(group) => with_state_and_notify(&state, &proxy, |s| s.enter_folder(group)),
        None => {
            let error = ClientError::StaleReference {
                kind: "Group",
                name: group_name.to_string(),
            };
            report_error(&state, &proxy, "Open folder", &error);
        }
    }
}

pub fn exit_folder<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.exit_folder());
}

/// Updates the search box text. Nothing is sent until the search is committed.
pub fn set_search_query<P: EventProxy>(query: String, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.search_query = query);
}

/// Runs the search box text against the gateway.
///
/// An empty query clears the search instead of sending a request.
pub async fn commit_search<P: EventProxy>(
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let query = lock_state(&state).search_query.trim().to_string();
    if query.is_empty() {
        with_state_and_notify(&state, &proxy, |s| s.clear_search());
        return;
    }
    if let Err(e) = run_search(query, gateway, &proxy, &state).await {
        report_error(&state, &proxy, "Search", &e);
    }
}

/// Changes the uploader filter.
///
/// The uploader is part of the server-side search scope, so a committed
/// search is sent again with the new scope.
pub async fn set_uploader_filter<P: EventProxy>(
    uploader: Option<String>,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let rerun = with_state_and_notify(&state, &proxy, |s| {
        if s.set_uploader_filter(uploader) {
            s.committed_query.clone()
        } else {
            None
        }
    });
    if let Some(query) = rerun {
        tracing::info!("Uploader filter changed, re-running search '{}'", query);
        if let Err(e) = run_search(query, gateway, &proxy, &state).await {
            report_error(&state, &proxy, "Search", &e);
        }
    }
}

pub fn set_kind_filter<P: EventProxy>(kind: KindFilter, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.set_kind_filter(kind));
}

pub fn set_tag_filter<P: EventProxy>(tag: Option<String>, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.set_tag_filter(tag));
}

pub fn toggle_group_expansion<P: EventProxy>(
    group_name: &str,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    with_state_and_notify(&state, &proxy, |s| s.toggle_group_expansion(group_name));
}

/// Pointer went down on a file: arms the long-press timer.
pub fn press_start<P: EventProxy>(
    file_id: FileId,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> JoinHandle<()> {
    let (token, threshold) = {
        let mut state_guard = lock_state(&state);
        let token = state_guard.selection.press_start(file_id, Instant::now());
        (token, state_guard.selection.long_press_threshold())
    };
    tasks::spawn_long_press_timer(token, threshold, proxy, state)
}

/// Pointer went up on a file. A short press counts as a tap.
pub fn press_release<P: EventProxy>(file_id: FileId, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        match s.selection.press_release(&file_id) {
            ReleaseOutcome::Tap(outcome) => apply_tap(s, outcome),
            ReleaseOutcome::LongPressEnded | ReleaseOutcome::Ignored => {}
        }
    });
}

/// Pointer moved off the file: the press is abandoned.
pub fn pointer_cancel<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.selection.pointer_cancel());
}

/// A click or tap that does not go through press tracking.
pub fn tap_file<P: EventProxy>(file_id: FileId, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        let outcome = s.selection.tap(file_id);
        apply_tap(s, outcome);
    });
}

fn apply_tap(state: &mut AppState, outcome: TapOutcome) {
    match outcome {
        TapOutcome::OpenDetail(file_id) => match find_known_file(state, &file_id) {
            Some(file) => state.detail_file = Some(file),
            None => tracing::warn!("Tapped file {} is not in the cached views", file_id),
        },
        TapOutcome::SelectionEmptied => state.merge_picker_open = false,
        TapOutcome::Selected(_) | TapOutcome::Deselected(_) => {}
    }
}

fn find_known_file(state: &AppState, file_id: &FileId) -> Option<FileRecord> {
    state
        .search_results
        .iter()
        .chain(state.current_folder.iter().flat_map(|g| g.files.iter()))
        .chain(
            state
                .open_collection
                .iter()
                .flat_map(|c| c.files.iter()),
        )
        .find(|f| &f.id == file_id)
        .or_else(|| state.snapshot.find_file(file_id))
        .cloned()
}

pub fn cancel_selection<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.cancel_selection());
}

pub fn close_detail<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.detail_file = None);
}

/// Uploads a file into the current folder, or into "My Uploads" at home.
pub async fn upload_file<P: EventProxy>(
    filename: String,
    bytes: Vec<u8>,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let request = match prepare_upload(filename, bytes, &proxy, &state) {
        Ok(request) => request,
        Err(e) => {
            report_error(&state, &proxy, "Upload", &e);
            return;
        }
    };

    tracing::info!(
        "Uploading '{}' ({} bytes, group: {:?})",
        request.filename,
        request.bytes.len(),
        request.group_id
    );
    let result = gateway.upload_file(request).await;
    with_state_and_notify(&state, &proxy, |s| {
        s.uploads_in_flight = s.uploads_in_flight.saturating_sub(1)
    });

    match result {
        Ok(record) => {
            tracing::info!("Uploaded '{}' as {}", record.filename, record.id);
            with_state_and_notify(&state, &proxy, |s| {
                s.status_message = format!("Uploaded \"{}\".", record.filename)
            });
            refresh(gateway, proxy, state).await;
        }
        Err(e) => report_error(&state, &proxy, "Upload", &e.into()),
    }
}

fn prepare_upload<P: EventProxy>(
    filename: String,
    bytes: Vec<u8>,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) -> Result<UploadRequest, ClientError> {
    let filename = sanitize_filename(&filename)?;
    if !is_accepted_upload(&filename) {
        return Err(ClientError::validation(format!(
            "Unsupported file type for \"{}\" (accepted: {})",
            filename,
            ACCEPTED_UPLOAD_EXTENSIONS.join(", ")
        )));
    }
    if bytes.is_empty() {
        return Err(ClientError::validation(format!(
            "\"{}\" is empty",
            filename
        )));
    }

    let mut state_guard = lock_state(state);
    let user_id = state_guard.user_id()?;
    let group_id = match &state_guard.current_folder {
        Some(folder) if !folder.is_my_uploads() => {
            let group_id = folder.effective_group_id();
            if group_id.is_none() {
                tracing::warn!(
                    "Cannot infer a group id for folder '{}', uploading to My Uploads",
                    folder.group_name
                );
                proxy.send_event(UserEvent::Notice(format!(
                    "\"{}\" has no files to take a group from; the upload goes to My Uploads.",
                    folder.group_name
                )));
            }
            group_id
        }
        _ => None,
    };
    state_guard.uploads_in_flight += 1;
    notify(proxy, &state_guard);

    Ok(UploadRequest {
        user_id,
        group_id,
        filename,
        bytes,
    })
}

/// Renames and/or re-tags a file. `tags_csv` is a comma-separated list.
pub async fn update_file<P: EventProxy>(
    file_id: FileId,
    filename: Option<String>,
    tags_csv: Option<String>,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let update = match build_update(filename, tags_csv) {
        Ok(update) => update,
        Err(e) => {
            report_error(&state, &proxy, "Save", &e);
            return;
        }
    };

    match gateway.update_file(&file_id, &update).await {
        Ok(record) => {
            tracing::info!("Updated file {}", file_id);
            with_state_and_notify(&state, &proxy, |s| {
                if s.detail_file.as_ref().is_some_and(|f| f.id == record.id) {
                    s.detail_file = Some(record.clone());
                }
                s.status_message = format!("Saved \"{}\".", record.filename);
            });
            refresh(gateway, proxy, state).await;
        }
        Err(e) => report_error(&state, &proxy, "Save", &stale_file(e, &file_id)),
    }
}

fn build_update(
    filename: Option<String>,
    tags_csv: Option<String>,
) -> Result<FileUpdate, ClientError> {
    if filename.is_none() && tags_csv.is_none() {
        return Err(ClientError::validation("Nothing to update"));
    }
    Ok(FileUpdate {
        filename: filename.as_deref().map(sanitize_filename).transpose()?,
        tags: tags_csv.as_deref().map(parse_tags),
    })
}

/// Deletes a file and drops it from every cached view, the selection included.
pub async fn delete_file<P: EventProxy>(
    file_id: FileId,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    match gateway.delete_file(&file_id).await {
        Ok(()) => {
            tracing::info!("Deleted file {}", file_id);
            with_state_and_notify(&state, &proxy, |s| {
                s.forget_file(&file_id);
                s.status_message = "File deleted.".to_string();
            });
        }
        Err(e) => {
            let not_found = matches!(e, GatewayError::NotFound(_));
            report_error(&state, &proxy, "Delete", &stale_file(e, &file_id));
            if !not_found {
                return;
            }
            with_state_and_notify(&state, &proxy, |s| s.forget_file(&file_id));
        }
    }
    refresh(gateway, proxy, state).await;
}

fn stale_file(error: GatewayError, file_id: &FileId) -> ClientError {
    match error {
        GatewayError::NotFound(_) => ClientError::StaleReference {
            kind: "File",
            name: file_id.to_string(),
        },
        other => other.into(),
    }
}

/// Lists the user's collections.
pub async fn load_collections<P: EventProxy>(
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let user_id = lock_state(&state).user_id();
    let user_id = match user_id {
        Ok(user_id) => user_id,
        Err(e) => {
            report_error(&state, &proxy, "Load collections", &e);
            return;
        }
    };
    match gateway.list_collections(&user_id).await {
        Ok(collections) => {
            tracing::info!("Loaded {} collections", collections.len());
            with_state_and_notify(&state, &proxy, |s| s.collections = collections);
        }
        Err(e) => report_error(&state, &proxy, "Load collections", &e.into()),
    }
}

pub async fn create_collection<P: EventProxy>(
    name: String,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let name = name.trim().to_string();
    let request = if name.is_empty() {
        Err(ClientError::validation("Collection name cannot be empty"))
    } else {
        lock_state(&state)
            .user_id()
            .map(|owner_id| NewCollection { name, owner_id })
    };
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            report_error(&state, &proxy, "Create collection", &e);
            return;
        }
    };

    match gateway.create_collection(&request).await {
        Ok(collection) => {
            tracing::info!("Created collection '{}' ({})", collection.name, collection.id);
            with_state_and_notify(&state, &proxy, |s| {
                s.status_message = format!("Created collection \"{}\".", collection.name);
                s.collections.push(collection);
            });
        }
        Err(e) => report_error(&state, &proxy, "Create collection", &e.into()),
    }
}

/// Opens a collection with its files resolved.
pub async fn open_collection<P: EventProxy>(
    collection_id: &str,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let generation = {
        let mut state_guard = lock_state(&state);
        state_guard.collection_generation += 1;
        state_guard.collection_generation
    };
    let result = gateway.get_collection_detail(collection_id).await;
    if lock_state(&state).collection_generation != generation {
        tracing::debug!("Discarding superseded detail for collection {}", collection_id);
        return;
    }

    match result {
        Ok(detail) => {
            with_state_and_notify(&state, &proxy, |s| s.open_collection = Some(detail));
        }
        Err(GatewayError::NotFound(_)) => {
            with_state_and_notify(&state, &proxy, |s| {
                s.collections.retain(|c| c.id != collection_id);
                if s.open_collection.as_ref().is_some_and(|c| c.id == collection_id) {
                    s.open_collection = None;
                }
            });
            let error = ClientError::StaleReference {
                kind: "Collection",
                name: collection_id.to_string(),
            };
            report_error(&state, &proxy, "Open collection", &error);
        }
        Err(e) => report_error(&state, &proxy, "Open collection", &e.into()),
    }
}

pub fn close_collection<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        s.collection_generation += 1;
        s.open_collection = None;
    });
}

/// Shows the collection picker. Only meaningful while files are selected.
pub fn open_merge_picker<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        s.merge_picker_open = s.selection.is_selecting();
    });
}

pub fn close_merge_picker<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| s.merge_picker_open = false);
}

/// Adds the selected files to a collection.
///
/// On success selection mode ends, unless the user changed the selection while
/// the merge was in flight. On failure the selection is kept so the user can
/// retry.
pub async fn merge_selection_into<P: EventProxy>(
    collection_id: &str,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let selection = lock_state(&state).selection.selected().clone();

    match merge::merge_into(gateway, collection_id, &selection).await {
        Ok(report) => {
            tracing::info!("{}", report.message());
            with_state_and_notify(&state, &proxy, |s| {
                if s.selection.selected() == &selection {
                    s.cancel_selection();
                } else {
                    tracing::debug!("Selection changed during the merge, keeping it");
                }
                s.status_message = report.message();
            });
            proxy.send_event(UserEvent::MergeComplete(report));
            load_collections(gateway, proxy, state).await;
        }
        Err(e) => {
            if matches!(e, ClientError::StaleReference { .. }) {
                with_state_and_notify(&state, &proxy, |s| {
                    s.collections.retain(|c| c.id != collection_id)
                });
            }
            report_error(&state, &proxy, "Add to collection", &e);
        }
    }
}

/// Writes the current settings to `path`.
pub fn export_config<P: EventProxy>(path: &Path, proxy: P, state: Arc<Mutex<AppState>>) {
    let result = settings::export_config(&lock_state(&state).config, path);
    match result {
        Ok(()) => {
            with_state_and_notify(&state, &proxy, |s| {
                s.status_message = format!("Exported settings to {}.", path.display())
            });
            proxy.send_event(UserEvent::ConfigExported(true));
        }
        Err(e) => {
            proxy.send_event(UserEvent::ConfigExported(false));
            let error = ClientError::Config(format!("{e:#}"));
            report_error(&state, &proxy, "Export settings", &error);
        }
    }
}

/// Replaces the settings with the ones stored at `path` and reloads.
///
/// The imported settings apply to this session only. The user and the
/// long-press threshold take effect at once; everything derived from the
/// previous user is dropped before the reload.
pub async fn import_config<P: EventProxy>(
    path: &Path,
    gateway: &dyn RemoteGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let new_config = match settings::import_config(path) {
        Ok(config) => config,
        Err(e) => {
            let error = ClientError::Config(format!("{e:#}"));
            report_error(&state, &proxy, "Import settings", &error);
            return;
        }
    };

    with_state_and_notify(&state, &proxy, |s| {
        s.selection
            .set_long_press_threshold(Duration::from_millis(new_config.long_press_ms));
        s.cancel_selection();
        s.exit_folder();
        s.detail_file = None;
        s.collection_generation += 1;
        s.open_collection = None;
        s.collections.clear();
        s.config = new_config;
        s.status_message = format!("Imported settings from {}.", path.display());
    });

    refresh(gateway, proxy.clone(), state.clone()).await;
    load_collections(gateway, proxy, state).await;
}
