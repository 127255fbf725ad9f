//! Environment overrides applied on top of the YAML file.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PORTALCHAT_BASE_URL` | `backend.baseUrl` |
//! | `PORTALCHAT_MODE` | `backend.mode` (`production`, `staging`, `development`) |
//! | `PORTALCHAT_DB` | `storage.dbPath` |
//! | `PORTALCHAT_LOG_LEVEL` | `logging.level` |
//! | `PORTALCHAT_LOG_DIR` | `logging.dir` |

use std::collections::HashMap;

use portalchat_core::BackendMode;
use thiserror::Error;

use crate::schema::PortalChatConfig;

#[derive(Debug, Error)]
#[error("Invalid value {value:?} for env var {var_name}: {reason}")]
pub struct EnvOverrideError {
    pub var_name: String,
    pub value: String,
    pub reason: String,
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: PortalChatConfig) -> Result<PortalChatConfig, EnvOverrideError> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: PortalChatConfig,
    env: &HashMap<String, String>,
) -> Result<PortalChatConfig, EnvOverrideError> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(url) = get("PORTALCHAT_BASE_URL") {
        config.backend.base_url = Some(url.to_string());
    }
    if let Some(mode) = get("PORTALCHAT_MODE") {
        config.backend.mode = parse_mode(mode).ok_or_else(|| EnvOverrideError {
            var_name: "PORTALCHAT_MODE".to_string(),
            value: mode.to_string(),
            reason: "expected production, staging, or development".to_string(),
        })?;
    }
    if let Some(db) = get("PORTALCHAT_DB") {
        config.storage.db_path = Some(db.to_string());
    }
    if let Some(level) = get("PORTALCHAT_LOG_LEVEL") {
        config.logging.level = level.to_string();
    }
    if let Some(dir) = get("PORTALCHAT_LOG_DIR") {
        config.logging.dir = Some(dir.to_string());
    }
    Ok(config)
}

fn parse_mode(value: &str) -> Option<BackendMode> {
    match value.to_ascii_lowercase().as_str() {
        "production" | "prod" => Some(BackendMode::Production),
        "staging" | "stage" => Some(BackendMode::Staging),
        "development" | "dev" => Some(BackendMode::Development),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn overrides_base_url_and_mode() {
        let cfg = apply_env_overrides_with(
            PortalChatConfig::default(),
            &env(&[
                ("PORTALCHAT_BASE_URL", "https://staging.example.com"),
                ("PORTALCHAT_MODE", "dev"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.backend.base_url.as_deref(), Some("https://staging.example.com"));
        assert_eq!(cfg.backend.mode, BackendMode::Development);
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = apply_env_overrides_with(
            PortalChatConfig::default(),
            &env(&[("PORTALCHAT_LOG_LEVEL", "   ")]),
        )
        .unwrap();
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let err = apply_env_overrides_with(
            PortalChatConfig::default(),
            &env(&[("PORTALCHAT_MODE", "qa")]),
        )
        .unwrap_err();
        assert_eq!(err.var_name, "PORTALCHAT_MODE");
    }
}
