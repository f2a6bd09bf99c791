pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default long-press threshold in milliseconds.
pub const DEFAULT_LONG_PRESS_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the remote file API.
    pub api_base_url: String,
    /// The signed-in user. Every listing and search is scoped to it.
    pub user_id: Option<String>,
    /// How long a press must be held before selection mode starts.
    pub long_press_ms: u64,
    pub request_timeout_secs: u64,
    pub skip_browser_warning: bool,
    /// Name of the folder that was open when the client last exited.
    pub last_folder: Option<String>,
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            user_id: None,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            request_timeout_secs: 30,
            skip_browser_warning: true,
            last_folder: None,
        }
    }
}
