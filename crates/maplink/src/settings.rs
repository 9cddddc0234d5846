//! Locations and loading of the server configuration and message snapshot.

use std::path::PathBuf;

use anyhow::Context;
use maplink_core::{ServerConfig, StoreSnapshot};
use tracing::info;

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "maplink";

/// `<config dir>/maplink/config.json`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}

/// `<data dir>/maplink/messages.json`.
pub fn snapshot_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR).join("messages.json"))
}

async fn existing(path: Option<PathBuf>) -> Option<PathBuf> {
    let path = path?;
    tokio::fs::try_exists(&path)
        .await
        .unwrap_or(false)
        .then_some(path)
}

/// Loads the configuration file, or the defaults if there is none.
pub async fn load_config() -> anyhow::Result<ServerConfig> {
    let Some(path) = existing(config_path()).await else {
        info!("no configuration file, using defaults");
        return Ok(ServerConfig::default());
    };
    let config = ServerConfig::load(&path)
        .await
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Loads the message snapshot, or an empty one if there is none.
pub async fn load_snapshot() -> anyhow::Result<StoreSnapshot> {
    let Some(path) = existing(snapshot_path()).await else {
        info!("no message snapshot, starting with empty stores");
        return Ok(StoreSnapshot::default());
    };
    let snapshot = StoreSnapshot::load(&path)
        .await
        .with_context(|| format!("loading messages from {}", path.display()))?;
    info!(
        path = %path.display(),
        sms_mms = snapshot.sms_mms.len(),
        email_accounts = snapshot.email_accounts.len(),
        "message snapshot loaded"
    );
    Ok(snapshot)
}
