//! User-facing failure text. Every terminal failure carries one of these
//! alongside its machine-readable `ErrorKind`.

use portalchat_core::{BackendMode, ErrorKind, PortalError, PortalId};

pub const LOGIN_REQUIRED: &str = "Your session has expired. Please log in again.";

pub const MALFORMED_RESPONSE: &str =
    "The portal returned a response that could not be understood. Please try again later.";

pub const INSUFFICIENT_PERMISSIONS: &str =
    "Your account has no portal with submit permission. Ask the portal administrator to grant \
     write access to at least one portal.";

/// Message for a non-2xx completion response.
pub fn http_status_message(status: u16) -> String {
    match status {
        400 => "The portal rejected the request (HTTP 400). Check the portal parameters.".into(),
        401 => "Authentication failed (HTTP 401). Please log in again.".into(),
        403 => "Access to this portal was refused (HTTP 403).".into(),
        404 => "The portal endpoint was not found (HTTP 404). Check the backend URL.".into(),
        429 => "Too many requests (HTTP 429). Wait a moment and try again.".into(),
        500 => "The portal server hit an internal error (HTTP 500).".into(),
        502 => "Bad gateway between you and the portal (HTTP 502).".into(),
        503 => "The portal service is temporarily unavailable (HTTP 503).".into(),
        504 => "The portal did not answer in time (HTTP 504).".into(),
        other => format!("Request failed (HTTP {other})."),
    }
}

/// Message for any error raised below the classifier.
pub fn error_message(err: &PortalError) -> String {
    match err {
        PortalError::NetworkUnavailable => {
            "No network connection. Check your connection and try again.".into()
        }
        PortalError::DnsUnresolved(host) => {
            format!("Could not resolve {host}. Check the backend URL and your DNS settings.")
        }
        PortalError::ConnectTimeout => "The connection to the portal timed out.".into(),
        PortalError::ConnectRefused(_) => "The portal refused the connection.".into(),
        PortalError::Io(detail) => format!("Network error while talking to the portal: {detail}"),
        PortalError::InvalidCredentials => "Invalid username or password.".into(),
        PortalError::CannotFetchLoginPage(status) => {
            format!("Could not load the login page (HTTP {status}).")
        }
        PortalError::SessionExpired => LOGIN_REQUIRED.into(),
        PortalError::InsufficientPortalPermissions => INSUFFICIENT_PERMISSIONS.into(),
        PortalError::UnexpectedStatus(status) => http_status_message(*status),
        PortalError::MalformedBackendResponse(_) => MALFORMED_RESPONSE.into(),
        other => other.to_string(),
    }
}

/// Guidance text for access-denied terminals. Production users are pointed
/// at their administrator; staging and development users at their test
/// account setup.
pub fn access_denied_guidance(
    kind: ErrorKind,
    mode: BackendMode,
    stale_candidates: bool,
    tried: &[PortalId],
) -> String {
    let mut text = match kind {
        ErrorKind::AllPortalsAccessDenied => {
            let tried = tried
                .iter()
                .map(PortalId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if tried.is_empty() {
                "Access was denied and no other portal is available to try.".to_string()
            } else {
                format!("Access was denied on every portal tried ({tried}).")
            }
        }
        _ => "Access to this portal was denied.".to_string(),
    };

    match mode {
        BackendMode::Production => text.push_str(
            " Your account may not have submit permission on these portals. \
             Contact the portal administrator to request access.",
        ),
        BackendMode::Staging | BackendMode::Development => text.push_str(&format!(
            " The {mode} backend may not grant this test account write access. \
             Check the account's portal roles or choose a different portal.",
        )),
    }

    if stale_candidates {
        text.push_str(
            " The portal list was not confirmed for this account; log out and back in \
             to refresh it.",
        );
    }
    text
}
