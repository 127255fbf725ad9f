use thiserror::Error;

use crate::types::ErrorKind;

/// Top-level error type for the PortalChat client.
///
/// Transport failures are mapped into the network variants at the lowest
/// layer, so the dispatch state machine never sees a raw I/O error.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("could not resolve host: {0}")]
    DnsUnresolved(String),

    #[error("connection timed out")]
    ConnectTimeout,

    #[error("connection refused: {0}")]
    ConnectRefused(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("cannot fetch login page (HTTP {0})")]
    CannotFetchLoginPage(u16),

    #[error("session expired; login required")]
    SessionExpired,

    #[error("account has no portal with submit permission")]
    InsufficientPortalPermissions,

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("malformed backend response: {0}")]
    MalformedBackendResponse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PortalError {
    /// Machine-readable kind carried into user-facing results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::NetworkUnavailable => ErrorKind::NetworkUnavailable,
            PortalError::DnsUnresolved(_) => ErrorKind::DnsUnresolved,
            PortalError::ConnectTimeout => ErrorKind::ConnectTimeout,
            PortalError::ConnectRefused(_) => ErrorKind::ConnectRefused,
            PortalError::Io(_) | PortalError::Storage(_) => ErrorKind::Io,
            PortalError::InvalidCredentials => ErrorKind::InvalidCredentials,
            PortalError::CannotFetchLoginPage(code) | PortalError::UnexpectedStatus(code) => {
                ErrorKind::Http(*code)
            }
            PortalError::SessionExpired => ErrorKind::LoginRequired,
            PortalError::InsufficientPortalPermissions => {
                ErrorKind::InsufficientPortalPermissions
            }
            PortalError::MalformedBackendResponse(_) => ErrorKind::MalformedBackendResponse,
        }
    }

    /// True for failures that happened before or while reaching the backend.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            PortalError::NetworkUnavailable
                | PortalError::DnsUnresolved(_)
                | PortalError::ConnectTimeout
                | PortalError::ConnectRefused(_)
                | PortalError::Io(_)
        )
    }
}
