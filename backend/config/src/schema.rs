//! PortalChat configuration schema.
//!
//! Typed for serde YAML/JSON with camelCase keys. Every section defaults, so
//! an empty file (or no file) yields a usable configuration.

use portalchat_core::BackendMode;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalChatConfig {
    /// Backend location and reverse-engineered URL layout
    pub backend: BackendConfig,

    /// HTTP transport timeouts and retry
    pub http: HttpConfig,

    /// Session lifetime
    pub session: SessionConfig,

    /// Portal id selection, fallbacks, and probing bounds
    pub portals: PortalsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Local persistence
    pub storage: StorageConfig,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// e.g. `https://portal.example.com`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub mode: BackendMode,
    /// Sent as the login form's locale field.
    pub locale: String,
    pub keep_logged_in: bool,
    pub paths: BackendPaths,
}

/// Known URL layouts of the backend. Templates may contain `{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendPaths {
    /// Used when discovery finds nothing.
    pub fallback_login_path: String,
    pub login_path_templates: Vec<String>,
    pub portal_base_templates: Vec<String>,
    /// Pages fetched to harvest tenant UUIDs.
    pub probe_paths: Vec<String>,
    /// Used when discovery finds no portal base.
    pub portal_base_path: String,
}

impl BackendPaths {
    pub fn uuid_login_templates(&self) -> impl Iterator<Item = &str> {
        self.login_path_templates
            .iter()
            .map(String::as_str)
            .filter(|t| t.contains(UUID_PLACEHOLDER))
    }

    pub fn plain_login_templates(&self) -> impl Iterator<Item = &str> {
        self.login_path_templates
            .iter()
            .map(String::as_str)
            .filter(|t| !t.contains(UUID_PLACEHOLDER))
    }
}

/// Placeholder substituted with a discovered tenant UUID.
pub const UUID_PLACEHOLDER: &str = "{uuid}";

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Attempts for idempotent requests, including the first.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

// ---------------------------------------------------------------------------
// Portals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalsConfig {
    /// Used when neither the request nor the store names a portal.
    pub default_portal_id: String,
    /// Read-only candidates used when discovery confirmed nothing writable.
    /// A POST to these may return 403.
    pub fallback_portal_ids: Vec<String>,
    /// Ids probed when the portal page exposes none.
    pub probe_candidates: Vec<String>,
    /// Probing stops after this many writable ids.
    pub max_confirmed: usize,
    /// Treat a 2xx non-JSON, non-HTML body as the reply text.
    pub lenient_plaintext_replies: bool,
}

// ---------------------------------------------------------------------------
// Logging & storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the rolling NDJSON log; console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// SQLite file for session state and portal configs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg: PortalChatConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, PortalChatConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
backend:
  baseUrl: https://portal.example.com
  mode: staging
portals:
  defaultPortalId: "12"
"#;
        let cfg: PortalChatConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.backend.base_url.as_deref(), Some("https://portal.example.com"));
        assert_eq!(cfg.backend.mode, BackendMode::Staging);
        assert_eq!(cfg.portals.default_portal_id, "12");
        assert_eq!(cfg.portals.max_confirmed, PortalsConfig::default().max_confirmed);
        assert!(!cfg.backend.paths.login_path_templates.is_empty());
    }

    #[test]
    fn templates_split_by_placeholder() {
        let paths = BackendPaths::default();
        assert!(paths.uuid_login_templates().all(|t| t.contains("{uuid}")));
        assert!(paths.plain_login_templates().all(|t| !t.contains("{uuid}")));
        assert!(paths.uuid_login_templates().count() > 0);
        assert!(paths.plain_login_templates().count() > 0);
    }
}
