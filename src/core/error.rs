//! Defines the error type surfaced by client operations.

use crate::gateway::GatewayError;
use thiserror::Error;

/// The primary error type for view-model operations.
///
/// Every variant is recoverable: commands turn these into a reported failure
/// and leave the previous state untouched.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A gateway call failed or timed out. The user may retry manually.
    #[error("Network request failed: {0}")]
    Network(#[from] GatewayError),

    /// Input was rejected before any gateway call was made.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A previously opened group or collection no longer exists.
    #[error("{kind} '{name}' no longer exists")]
    StaleReference { kind: &'static str, name: String },

    /// A settings file could not be read or written.
    #[error("Settings file error: {0}")]
    Config(String),

    /// The operation needs a signed-in user and none is configured.
    #[error("No user is configured for this client")]
    NoUser,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// `true` when repeating the same operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}
