//! `portalchat-portal`: talks to the Portal backend.
//!
//! Login through the HTML form, infer the backend's URL layout, find the
//! portals the account may submit to, and dispatch chat prompts with one
//! silent re-login and alternative-portal fallback.

pub mod access_prober;
pub mod auth;
pub mod classifier;
pub mod client;
pub mod discovery;
pub mod dispatch;
pub mod messages;
pub mod portal_list;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use access_prober::{scrape_portal_ids, PortalAccessProber};
pub use auth::{AuthEngine, AuthSettings};
pub use classifier::{Classification, HeuristicClassifier, ResponseClassifier};
pub use client::{Collaborators, PortalClient};
pub use discovery::{DiscoveryCache, EndpointDiscovery};
pub use dispatch::{ChatDispatcher, ChatRequest, DispatchSettings};
pub use portal_list::{parse_portal_list, PortalListDiscovery};
pub use session::SessionManager;
