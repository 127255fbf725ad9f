//! HTTP plumbing for PortalChat: a reqwest transport that never follows
//! redirects, a process-wide origin-keyed cookie jar, a DNS pre-flight
//! check, and the retry policy for idempotent requests.

pub mod client;
pub mod connectivity;
pub mod cookie_jar;
pub mod retry;

pub use client::{ReqwestTransport, TransportSettings};
pub use connectivity::SystemConnectivity;
pub use cookie_jar::{merge_cookie_headers, PortalCookieJar};
pub use retry::RetryPolicy;
