use std::fmt;

use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default session lifetime.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Upload field value sent when the user attached no file.
pub const EMPTY_UPLOAD_MARKER: &str = "data:application/octet-stream;base64,";

// ---------------------------------------------------------------------------
// Credentials & session
// ---------------------------------------------------------------------------

/// Login credentials for one backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub base_url: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: base_url.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Raw `name=value` cookie pairs joined with `; `.
    pub cookie: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Session {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            created_at: Utc::now(),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Backend URL structure inferred by endpoint discovery. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEndpoints {
    pub login_path: Option<String>,
    pub portal_base_path: Option<String>,
    pub completion_endpoint: Option<String>,
    pub detected_uuid: Option<String>,
    pub discovery_success: bool,
}

// ---------------------------------------------------------------------------
// Portals
// ---------------------------------------------------------------------------

/// Identifier selecting which portal configuration to submit to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortalId(String);

impl PortalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PortalId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u64> for PortalId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Inferred permission level of a portal id. Never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Inaccessible,
    ReadOnly,
    ReadWrite,
}

/// Portal ids the user can submit to; the first one is the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailablePortalIds {
    ids: Vec<PortalId>,
}

impl AvailablePortalIds {
    pub fn new(ids: Vec<PortalId>) -> Self {
        let mut unique: Vec<PortalId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !id.as_str().is_empty() && !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { ids: unique }
    }

    pub fn ids(&self) -> &[PortalId] {
        &self.ids
    }

    pub fn default_id(&self) -> Option<&PortalId> {
        self.ids.first()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// What the last discovery learned about submit permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalAvailability {
    /// Confirmed writable ids.
    Writable(AvailablePortalIds),
    /// Known read-only candidates; a POST may still return 403.
    StaleFallback(Vec<PortalId>),
    /// Nothing writable and no fallback configured.
    NoSubmitPermission,
}

impl PortalAvailability {
    /// Stable tag persisted in the session store.
    pub fn tag(&self) -> &'static str {
        match self {
            PortalAvailability::Writable(_) => "writable",
            PortalAvailability::StaleFallback(_) => "stale",
            PortalAvailability::NoSubmitPermission => "none",
        }
    }

    pub fn ids(&self) -> &[PortalId] {
        match self {
            PortalAvailability::Writable(ids) => ids.ids(),
            PortalAvailability::StaleFallback(ids) => ids,
            PortalAvailability::NoSubmitPermission => &[],
        }
    }
}

/// One named form parameter of a portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalParameter {
    pub value: String,
    #[serde(rename = "type", default = "default_parameter_type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

fn default_parameter_type() -> String {
    "text".to_string()
}

impl PortalParameter {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: default_parameter_type(),
            required: false,
            description: String::new(),
        }
    }
}

/// User-managed portal configuration. A non-empty parameter map replaces
/// the default `USERPROMPT` / `USERUPLOADFILE` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub id: PortalId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: IndexMap<String, PortalParameter>,
}

impl PortalConfig {
    pub fn new(id: impl Into<PortalId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            parameters: IndexMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, parameter: PortalParameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }
}

/// A portal as reported by the structured list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSummary {
    pub id: PortalId,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub parameters: IndexMap<String, PortalParameter>,
}

impl PortalSummary {
    /// Seed a user-managed configuration from a discovered portal.
    pub fn to_portal_config(&self) -> PortalConfig {
        PortalConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Outcome of structured portal list discovery.
#[derive(Debug, Clone, Default)]
pub struct PortalListResult {
    pub portals: Vec<PortalSummary>,
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// `data:<mime>;base64,<payload>` form expected by the upload field.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Which backend deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    #[default]
    Production,
    Staging,
    Development,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Production => write!(f, "production"),
            BackendMode::Staging => write!(f, "staging"),
            BackendMode::Development => write!(f, "development"),
        }
    }
}

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkUnavailable,
    DnsUnresolved,
    ConnectTimeout,
    ConnectRefused,
    Io,
    InvalidCredentials,
    LoginRequired,
    PortalAccessDenied,
    AllPortalsAccessDenied,
    InsufficientPortalPermissions,
    MalformedBackendResponse,
    Http(u16),
}

impl ErrorKind {
    pub fn tag(&self) -> String {
        match self {
            ErrorKind::NetworkUnavailable => "NETWORK_UNAVAILABLE".into(),
            ErrorKind::DnsUnresolved => "DNS_UNRESOLVED".into(),
            ErrorKind::ConnectTimeout => "CONNECT_TIMEOUT".into(),
            ErrorKind::ConnectRefused => "CONNECT_REFUSED".into(),
            ErrorKind::Io => "IO_ERROR".into(),
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS".into(),
            ErrorKind::LoginRequired => "LOGIN_REQUIRED".into(),
            ErrorKind::PortalAccessDenied => "PORTAL_ACCESS_DENIED".into(),
            ErrorKind::AllPortalsAccessDenied => "ALL_PORTALS_ACCESS_DENIED".into(),
            ErrorKind::InsufficientPortalPermissions => "INSUFFICIENT_PORTAL_PERMISSIONS".into(),
            ErrorKind::MalformedBackendResponse => "MALFORMED_BACKEND_RESPONSE".into(),
            ErrorKind::Http(code) => format!("HTTP_{code}"),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            ErrorKind::PortalAccessDenied | ErrorKind::AllPortalsAccessDenied
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Final result of one chat dispatch, ready for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
}

impl ChatResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_kind: Some(kind),
        }
    }
}

/// Result of a full login (authentication plus portal availability).
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub success: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    pub availability: Option<PortalAvailability>,
}
