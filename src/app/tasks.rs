//! Long-running work that talks to the gateway or waits on a timer.
//!
//! Each task takes what it needs from the state under the lock, releases the
//! lock for the remote call and re-checks a generation counter before it
//! applies the response. A response whose counter moved on in the meantime
//! belongs to a context the user already left and is dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::events::UserEvent;
use super::helpers::{lock_state, notify};
use super::proxy::EventProxy;
use super::state::AppState;
use crate::core::error::ClientError;
use crate::core::{Group, SearchRequest};
use crate::gateway::RemoteGateway;

/// Fetches a fresh snapshot and installs it.
///
/// On failure the previous snapshot stays in place and the error is returned
/// for the caller to report. A vanished folder is not a failure: the view
/// falls back to home and a notice is sent.
pub async fn refresh_files<P: EventProxy>(
    gateway: &dyn RemoteGateway,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) -> Result<(), ClientError> {
    let (user_id, generation) = {
        let mut state_guard = lock_state(state);
        let user_id = state_guard.user_id()?;
        state_guard.refresh_generation += 1;
        state_guard.is_loading = true;
        notify(proxy, &state_guard);
        (user_id, state_guard.refresh_generation)
    };

    tracing::info!("Refreshing files for user {}", user_id);
    let result = gateway.list_files(&user_id).await;

    let mut state_guard = lock_state(state);
    if state_guard.refresh_generation != generation {
        tracing::debug!("Discarding superseded refresh response");
        return Ok(());
    }
    state_guard.is_loading = false;

    match result {
        Ok(snapshot) => {
            let file_count: usize = snapshot.groups.iter().map(|g| g.files.len()).sum();
            tracing::info!(
                "Loaded {} files in {} groups",
                file_count,
                snapshot.groups.len()
            );
            let stale = state_guard.apply_snapshot(snapshot);
            state_guard.status_message = format!("Loaded {} files.", file_count);
            if let Some(stale) = stale {
                state_guard.status_message = stale.to_string();
                proxy.send_event(UserEvent::Notice(stale.to_string()));
            }
            notify(proxy, &state_guard);
            Ok(())
        }
        Err(e) => {
            notify(proxy, &state_guard);
            Err(e.into())
        }
    }
}

/// Sends `query` to the gateway, scoped to the current folder and uploader.
///
/// The response is applied only if no navigation, reset or newer search
/// happened while it was in flight.
pub async fn run_search<P: EventProxy>(
    query: String,
    gateway: &dyn RemoteGateway,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) -> Result<(), ClientError> {
    let (ticket, request) = {
        let mut state_guard = lock_state(state);
        let user_id = state_guard.user_id()?;
        let request = SearchRequest {
            query: query.clone(),
            user_id,
            group_id: state_guard
                .current_folder
                .as_ref()
                .and_then(Group::effective_group_id),
            owner_id: state_guard.filter.uploader.clone(),
        };
        let ticket = state_guard.begin_search(query);
        notify(proxy, &state_guard);
        (ticket, request)
    };

    tracing::info!(
        "Searching for '{}' (group: {:?}, owner: {:?})",
        request.query,
        request.group_id,
        request.owner_id
    );
    let result = gateway
        .search_files(&request)
        .await
        .map_err(ClientError::from);

    let mut state_guard = lock_state(state);
    match result {
        Ok(files) => {
            if state_guard.finish_search(ticket, Ok(files)) {
                notify(proxy, &state_guard);
            }
            Ok(())
        }
        Err(e) => {
            if state_guard.finish_search(ticket, Err(&e)) {
                notify(proxy, &state_guard);
                Err(e)
            } else {
                Ok(())
            }
        }
    }
}

/// Waits out the long-press threshold for the press identified by `token`.
///
/// If the press is still held when the timer fires, the engine enters
/// selection mode and the UI is notified. Releasing, cancelling or starting
/// another press first makes the token stale and the timer a no-op.
pub fn spawn_long_press_timer<P: EventProxy>(
    token: u64,
    threshold: Duration,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(threshold).await;
        let mut state_guard = lock_state(&state);
        if state_guard.selection.long_press_elapsed(token) {
            tracing::info!("Long press entered selection mode");
            notify(&proxy, &state_guard);
        }
    })
}
