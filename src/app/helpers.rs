//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, MutexGuard};

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::generate_ui_state;
use crate::core::error::ClientError;

pub fn lock_state(state: &Arc<Mutex<AppState>>) -> MutexGuard<'_, AppState> {
    state
        .lock()
        .expect("Mutex was poisoned. This should not happen.")
}

/// Sends a `StateUpdate` built from the given state.
pub fn notify<P: EventProxy>(proxy: &P, state: &AppState) {
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(state))));
}

/// A helper function that locks the `AppState`, performs a mutation,
/// and then automatically sends a `StateUpdate` event to the UI.
///
/// This significantly reduces boilerplate in the command handlers.
pub fn with_state_and_notify<F, R, P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    update_fn: F,
) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    let mut state_guard = lock_state(state);
    let result = update_fn(&mut state_guard);
    notify(proxy, &state_guard);
    result
}

/// Reports a failed operation: logs it, records it in the status line and
/// sends a `ShowError` followed by a state update.
pub fn report_error<P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    operation: &str,
    error: &ClientError,
) {
    tracing::error!("{} failed: {}", operation, error);
    let message = format!("{} failed: {}", operation, error);
    proxy.send_event(UserEvent::ShowError(message.clone()));
    with_state_and_notify(state, proxy, |s| s.status_message = message);
}
