//! Config defaults: the backend layout observed in the field, plus
//! conservative transport and probing bounds.

use portalchat_core::{BackendMode, SESSION_TTL_HOURS};

use crate::schema::{BackendConfig, BackendPaths, HttpConfig, LoggingConfig, PortalsConfig, SessionConfig};

/// Known-good login path used when discovery finds nothing.
pub const DEFAULT_LOGIN_PATH: &str = "/wise/wiseadm/s/login";

/// Portal base path used when discovery finds nothing.
pub const DEFAULT_PORTAL_BASE_PATH: &str = "/wise/wiseadm/s/promptportal/portal";

/// Portal id submitted to when nothing else is known.
pub const DEFAULT_PORTAL_ID: &str = "1";

/// Writable ids confirmed before probing stops.
pub const DEFAULT_MAX_CONFIRMED: usize = 3;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            mode: BackendMode::Production,
            locale: "zh_TW".to_string(),
            keep_logged_in: true,
            paths: BackendPaths::default(),
        }
    }
}

impl Default for BackendPaths {
    fn default() -> Self {
        Self {
            fallback_login_path: DEFAULT_LOGIN_PATH.to_string(),
            login_path_templates: vec![
                "/wise/wiseadm/s/subadmin/{uuid}/login".to_string(),
                "/wise/wiseadm/s/admin/{uuid}/login".to_string(),
                "/wise/wiseadm/s/{uuid}/login".to_string(),
                DEFAULT_LOGIN_PATH.to_string(),
                "/wise/wiseadm/login".to_string(),
                "/login".to_string(),
            ],
            portal_base_templates: vec![
                DEFAULT_PORTAL_BASE_PATH.to_string(),
                "/wise/wiseadm/s/portal".to_string(),
                "/wise/portal".to_string(),
            ],
            probe_paths: vec![
                "/".to_string(),
                "/wise/wiseadm/".to_string(),
                "/wise/wiseadm/s/".to_string(),
            ],
            portal_base_path: DEFAULT_PORTAL_BASE_PATH.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            user_agent: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: SESSION_TTL_HOURS,
        }
    }
}

impl Default for PortalsConfig {
    fn default() -> Self {
        Self {
            default_portal_id: DEFAULT_PORTAL_ID.to_string(),
            fallback_portal_ids: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            probe_candidates: (1..=10).map(|i| i.to_string()).collect(),
            max_confirmed: DEFAULT_MAX_CONFIRMED,
            lenient_plaintext_replies: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_login_path_is_a_template() {
        let paths = BackendPaths::default();
        assert!(paths
            .login_path_templates
            .iter()
            .any(|t| t == &paths.fallback_login_path));
    }

    #[test]
    fn portal_defaults_are_bounded() {
        let portals = PortalsConfig::default();
        assert_eq!(portals.max_confirmed, 3);
        assert_eq!(portals.probe_candidates.len(), 10);
        assert!(portals.lenient_plaintext_replies);
    }
}
