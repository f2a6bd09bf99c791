//! Defines the event and message structures for communication between the
//! engine and the presentation layer.

use serde::Deserialize;

use super::merge::MergeReport;
use super::view_model::UiState;

/// Events sent from the engine to the presentation layer.
#[derive(Debug)]
pub enum UserEvent {
    /// A complete state update to re-render the UI.
    StateUpdate(Box<UiState>),
    /// An error message to be displayed to the user.
    ShowError(String),
    /// A transient, non-error notice (e.g. "Folder no longer exists").
    Notice(String),
    /// Files were merged into a collection.
    MergeComplete(MergeReport),
    /// The result of an export operation.
    ConfigExported(bool),
}

/// A message received from the presentation layer.
#[derive(Deserialize, Debug)]
pub struct IpcMessage {
    /// The name of the command to execute.
    pub command: String,
    /// The payload associated with the command, as a JSON value.
    #[serde(default)]
    pub payload: serde_json::Value,
}
