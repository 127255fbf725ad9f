//! Config validation: schema checks with user-friendly error messages.

use thiserror::Error;
use url::Url;

use crate::schema::{PortalChatConfig, UUID_PLACEHOLDER};

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &PortalChatConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_backend(config, &mut report);
    validate_http(config, &mut report);
    validate_session(config, &mut report);
    validate_portals(config, &mut report);
    report
}

fn validate_backend(config: &PortalChatConfig, report: &mut ValidationReport) {
    match config.backend.base_url.as_deref() {
        None => report.warn(
            "backend.baseUrl",
            "No backend URL configured; pass one at login time",
        ),
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if url.scheme() == "http" {
                    report.warn("backend.baseUrl", "Credentials will be sent over plain HTTP");
                }
            }
            Ok(url) => report.error(
                "backend.baseUrl",
                format!("Unsupported scheme '{}'; expected http or https", url.scheme()),
            ),
            Err(e) => report.error("backend.baseUrl", format!("Invalid URL: {e}")),
        },
    }

    let paths = &config.backend.paths;
    if paths.login_path_templates.is_empty() {
        report.error("backend.paths.loginPathTemplates", "At least one login path is required");
    }
    if paths.portal_base_templates.is_empty() {
        report.error("backend.paths.portalBaseTemplates", "At least one portal base is required");
    }
    if !paths.fallback_login_path.starts_with('/') {
        report.error("backend.paths.fallbackLoginPath", "Path must start with '/'");
    }
    if paths.fallback_login_path.contains(UUID_PLACEHOLDER) {
        report.error(
            "backend.paths.fallbackLoginPath",
            "Fallback path cannot contain a {uuid} placeholder",
        );
    }
    if paths.portal_base_templates.iter().any(|t| t.contains(UUID_PLACEHOLDER)) {
        report.warn(
            "backend.paths.portalBaseTemplates",
            "{uuid} is only substituted in login paths",
        );
    }
}

fn validate_http(config: &PortalChatConfig, report: &mut ValidationReport) {
    if config.http.connect_timeout_secs == 0 {
        report.error("http.connectTimeoutSecs", "Must be greater than 0");
    }
    if config.http.request_timeout_secs == 0 {
        report.error("http.requestTimeoutSecs", "Must be greater than 0");
    }
    if config.http.max_attempts == 0 {
        report.error("http.maxAttempts", "Must be at least 1");
    }
}

fn validate_session(config: &PortalChatConfig, report: &mut ValidationReport) {
    if config.session.ttl_hours <= 0 {
        report.error("session.ttlHours", "Must be greater than 0");
    }
}

fn validate_portals(config: &PortalChatConfig, report: &mut ValidationReport) {
    let portals = &config.portals;
    if portals.default_portal_id.trim().is_empty() {
        report.error("portals.defaultPortalId", "Default portal id cannot be empty");
    }
    if portals.max_confirmed == 0 {
        report.error("portals.maxConfirmed", "Must be at least 1");
    }
    if portals.probe_candidates.is_empty() {
        report.warn(
            "portals.probeCandidates",
            "No probe candidates; availability relies on the portal list alone",
        );
    }
    if portals.fallback_portal_ids.is_empty() {
        report.warn(
            "portals.fallbackPortalIds",
            "No fallback ids; failed discovery means no submit permission",
        );
    }
    if portals.lenient_plaintext_replies {
        report.warn(
            "portals.lenientPlaintextReplies",
            "Plain-text 2xx bodies are shown as replies; proxy error pages may slip through",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> PortalChatConfig {
        let mut cfg = PortalChatConfig::default();
        cfg.backend.base_url = Some(url.to_string());
        cfg
    }

    #[test]
    fn default_config_is_valid() {
        let report = validate(&with_url("https://portal.example.com"));
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn rejects_non_http_scheme() {
        let report = validate(&with_url("ftp://portal.example.com"));
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "backend.baseUrl");
    }

    #[test]
    fn warns_on_plain_http() {
        let report = validate(&with_url("http://portal.example.com"));
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.path == "backend.baseUrl"));
    }

    #[test]
    fn rejects_zero_ttl_and_empty_default_id() {
        let mut cfg = with_url("https://portal.example.com");
        cfg.session.ttl_hours = 0;
        cfg.portals.default_portal_id = " ".into();
        cfg.portals.max_confirmed = 0;
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"session.ttlHours"));
        assert!(paths.contains(&"portals.defaultPortalId"));
        assert!(paths.contains(&"portals.maxConfirmed"));
    }
}
