pub mod error;
pub mod http;
pub mod traits;
pub mod types;

pub use error::PortalError;
pub use http::{cookie_pair, join_url, HttpRequest, HttpResponse, Method};
pub use traits::{
    Connectivity, CredentialVault, HttpTransport, PortalConfigRepository, SessionStore,
};
pub use types::{
    AccessLevel, Attachment, AvailablePortalIds, BackendMode, ChatResponse, Credentials,
    DiscoveredEndpoints, ErrorKind, LoginResult, PortalAvailability, PortalConfig, PortalId,
    PortalListResult, PortalParameter, PortalSummary, Session, EMPTY_UPLOAD_MARKER,
    SESSION_TTL_HOURS,
};
