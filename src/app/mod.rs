//! The engine between the presentation layer and the remote gateway.
//!
//! The UI sends `IpcMessage`s in and receives `UserEvent`s back; everything in
//! between lives in the shared `AppState`.

pub mod commands;
pub mod events;
pub mod filtering;
pub mod helpers;
pub mod merge;
pub mod proxy;
pub mod selection;
pub mod state;
pub mod tasks;
pub mod view_model;

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::file_kind::KindFilter;
use crate::core::FileId;
use crate::gateway::RemoteGateway;
use events::{IpcMessage, UserEvent};
use proxy::EventProxy;
use state::AppState;

/// The gateway shared by every command handler.
pub type SharedGateway = Arc<dyn RemoteGateway>;

#[derive(Deserialize)]
struct NamePayload {
    name: String,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
struct PathPayload {
    path: PathBuf,
}

#[derive(Deserialize)]
struct QueryPayload {
    #[serde(default)]
    query: String,
}

#[derive(Deserialize)]
struct UploaderPayload {
    #[serde(default)]
    uploader: Option<String>,
}

#[derive(Deserialize)]
struct KindPayload {
    kind: KindFilter,
}

#[derive(Deserialize)]
struct TagPayload {
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Deserialize)]
struct UploadPayload {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct UpdatePayload {
    id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

/// Parses a raw IPC message and runs the command on the runtime.
pub fn handle_ipc_message<P: EventProxy>(
    message: String,
    gateway: SharedGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    match serde_json::from_str::<IpcMessage>(&message) {
        Ok(msg) => {
            tokio::spawn(async move {
                dispatch(msg, gateway, proxy, state).await;
            });
        }
        Err(e) => {
            tracing::warn!("Failed to parse IPC message: {} ({})", e, message);
        }
    }
}

fn parse_payload<T, P>(msg: &IpcMessage, proxy: &P) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
    P: EventProxy,
{
    match serde_json::from_value(msg.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Invalid payload for '{}': {}", msg.command, e);
            proxy.send_event(UserEvent::ShowError(format!(
                "Invalid request '{}': {}",
                msg.command, e
            )));
            None
        }
    }
}

/// Routes a parsed message to its command handler.
pub async fn dispatch<P: EventProxy>(
    msg: IpcMessage,
    gateway: SharedGateway,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let gateway = gateway.as_ref();
    match msg.command.as_str() {
        "initialize" => commands::initialize(gateway, proxy, state).await,
        "refresh" => commands::refresh(gateway, proxy, state).await,
        "enterFolder" => {
            if let Some(p) = parse_payload::<NamePayload, _>(&msg, &proxy) {
                commands::enter_folder(&p.name, proxy, state);
            }
        }
        "exitFolder" => commands::exit_folder(proxy, state),
        "setSearchQuery" => {
            if let Some(p) = parse_payload::<QueryPayload, _>(&msg, &proxy) {
                commands::set_search_query(p.query, proxy, state);
            }
        }
        "commitSearch" => commands::commit_search(gateway, proxy, state).await,
        "setUploaderFilter" => {
            if let Some(p) = parse_payload::<UploaderPayload, _>(&msg, &proxy) {
                commands::set_uploader_filter(p.uploader, gateway, proxy, state).await;
            }
        }
        "setKindFilter" => {
            if let Some(p) = parse_payload::<KindPayload, _>(&msg, &proxy) {
                commands::set_kind_filter(p.kind, proxy, state);
            }
        }
        "setTagFilter" => {
            if let Some(p) = parse_payload::<TagPayload, _>(&msg, &proxy) {
                commands::set_tag_filter(p.tag, proxy, state);
            }
        }
        "toggleGroupExpansion" => {
            if let Some(p) = parse_payload::<NamePayload, _>(&msg, &proxy) {
                commands::toggle_group_expansion(&p.name, proxy, state);
            }
        }
        "pressStart" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::press_start(FileId::from(p.id), proxy, state);
            }
        }
        "pressRelease" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::press_release(FileId::from(p.id), proxy, state);
            }
        }
        "pointerCancel" => commands::pointer_cancel(proxy, state),
        "tapFile" | "toggleSelection" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::tap_file(FileId::from(p.id), proxy, state);
            }
        }
        "cancelSelection" => commands::cancel_selection(proxy, state),
        "closeDetail" => commands::close_detail(proxy, state),
        "uploadFile" => {
            if let Some(p) = parse_payload::<UploadPayload, _>(&msg, &proxy) {
                commands::upload_file(p.filename, p.bytes, gateway, proxy, state).await;
            }
        }
        "updateFile" => {
            if let Some(p) = parse_payload::<UpdatePayload, _>(&msg, &proxy) {
                commands::update_file(
                    FileId::from(p.id),
                    p.filename,
                    p.tags,
                    gateway,
                    proxy,
                    state,
                )
                .await;
            }
        }
        "deleteFile" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::delete_file(FileId::from(p.id), gateway, proxy, state).await;
            }
        }
        "loadCollections" => commands::load_collections(gateway, proxy, state).await,
        "createCollection" => {
            if let Some(p) = parse_payload::<NamePayload, _>(&msg, &proxy) {
                commands::create_collection(p.name, gateway, proxy, state).await;
            }
        }
        "openCollection" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::open_collection(&p.id, gateway, proxy, state).await;
            }
        }
        "closeCollection" => commands::close_collection(proxy, state),
        "openMergePicker" => commands::open_merge_picker(proxy, state),
        "closeMergePicker" => commands::close_merge_picker(proxy, state),
        "mergeSelection" => {
            if let Some(p) = parse_payload::<IdPayload, _>(&msg, &proxy) {
                commands::merge_selection_into(&p.id, gateway, proxy, state).await;
            }
        }
        "exportConfig" => {
            if let Some(p) = parse_payload::<PathPayload, _>(&msg, &proxy) {
                commands::export_config(&p.path, proxy, state);
            }
        }
        "importConfig" => {
            if let Some(p) = parse_payload::<PathPayload, _>(&msg, &proxy) {
                commands::import_config(&p.path, gateway, proxy, state).await;
            }
        }
        _ => tracing::warn!("Unknown IPC command: {}", msg.command),
    }
}
