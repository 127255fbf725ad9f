use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;

use crate::error::PortalError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{PortalConfig, PortalId};

/// Cookie-aware HTTP client shared by every component.
///
/// Implementations must not follow redirects and must map connection
/// failures into the network variants of [`PortalError`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, PortalError>;

    /// Drop every cookie the transport holds. Transports without a jar
    /// have nothing to forget.
    async fn clear_cookies(&self) {}
}

/// Pre-flight reachability check run before a login attempt.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Fails with `NetworkUnavailable` or `DnsUnresolved` without touching the backend.
    async fn preflight(&self, base_url: &str) -> Result<(), PortalError>;
}

/// Persistent key/value store for session state.
///
/// The store does not expire entries; TTL checks belong to the caller.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys as one unit. Stores with transactions override this.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

/// Short-lived holder for the plaintext password used for silent re-login.
///
/// Entries must expire after their TTL and must never be persisted unencrypted.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    async fn store(&self, username: &str, password: &str, ttl: Duration) -> Result<()>;

    async fn load(&self, username: &str) -> Result<Option<String>>;

    async fn clear(&self) -> Result<()>;
}

/// Storage for user-managed portal configurations.
#[async_trait]
pub trait PortalConfigRepository: Send + Sync {
    async fn save(&self, config: &PortalConfig) -> Result<()>;

    async fn load(&self, id: &PortalId) -> Result<Option<PortalConfig>>;

    async fn list(&self) -> Result<Vec<PortalConfig>>;

    async fn delete(&self, id: &PortalId) -> Result<()>;
}
