//! Config file read/write with an atomic rename and a single backup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::schema::PortalChatConfig;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default SQLite file name within the config directory.
const DB_FILE_NAME: &str = "portalchat.db";

/// Resolve the PortalChat config directory.
/// Priority: `PORTALCHAT_CONFIG_DIR` env > `~/.portalchat/` > `./.portalchat`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PORTALCHAT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".portalchat"))
        .unwrap_or_else(|| PathBuf::from(".portalchat"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// SQLite path: the configured one, else inside the config directory.
pub fn database_path(config: &PortalChatConfig, config_dir: &Path) -> PathBuf {
    config
        .storage
        .db_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join(DB_FILE_NAME))
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<PortalChatConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(PortalChatConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: PortalChatConfig = if raw.trim().is_empty() {
        PortalChatConfig::default()
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?
    };

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write config to disk atomically (temp file, then rename), keeping the
/// previous version as `config.yaml.bak`.
pub async fn write_config(config: &PortalChatConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if path.exists() {
        let bak = path.with_extension("yaml.bak");
        if let Err(e) = fs::copy(path, &bak).await {
            warn!("Failed to create backup {}: {}", bak.display(), e);
        }
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}
