use anyhow::Result;
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::ClientConfig;

const APP_NAME: &str = "Filefolio";
const CONFIG_FILE: &str = "config.json";

/// Overrides the API base URL from the environment.
pub const API_URL_ENV: &str = "FILEFOLIO_API_URL";
/// Overrides the signed-in user from the environment.
pub const USER_ID_ENV: &str = "FILEFOLIO_USER_ID";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "filefolio", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the client configuration from `path`, or from the platform config
/// file when `path` is `None`.
///
/// A missing file is created with defaults. A file that cannot be parsed is
/// migrated if possible and otherwise replaced by defaults in memory, so a bad
/// config never prevents the client from starting. Environment overrides are
/// applied last.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = resolve_path(path)?;

    let config = if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = ClientConfig::default();
        save_config(&default_config, Some(&config_path))?;
        default_config
    } else {
        let config_content = fs::read_to_string(&config_path)?;
        match serde_json::from_str::<ClientConfig>(&config_content) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", config_path);
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config file at {:?}: {}. Falling back to default config.",
                    config_path,
                    e
                );
                migrate_legacy_config(&config_content).unwrap_or_default()
            }
        }
    };

    Ok(apply_env_overrides(config))
}

fn apply_env_overrides(mut config: ClientConfig) -> ClientConfig {
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            tracing::info!("Using API URL from {}", API_URL_ENV);
            config.api_base_url = url.trim().to_string();
        }
    }
    if let Ok(user) = std::env::var(USER_ID_ENV) {
        if !user.trim().is_empty() {
            config.user_id = Some(user.trim().to_string());
        }
    }
    config
}

/// Fills fields missing from an older config file with their defaults.
fn migrate_legacy_config(config_content: &str) -> Result<ClientConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = serde_json::to_value(ClientConfig::default())?;
    if let Value::Object(default_fields) = defaults {
        for (key, default_val) in default_fields {
            if obj.get(&key).map_or(true, Value::is_null) {
                obj.insert(key, default_val);
            }
        }
    }

    let migrated_config: ClientConfig = serde_json::from_value(Value::Object(obj.clone()))?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the provided configuration to `path` or the platform config file.
pub fn save_config(config: &ClientConfig, path: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &ClientConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<ClientConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<ClientConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}
