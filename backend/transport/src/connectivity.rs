//! Login pre-flight: network availability flag plus DNS resolution.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use portalchat_core::{Connectivity, PortalError};

/// Connectivity check backed by the system resolver.
///
/// The host platform flips `set_online` from its network callbacks; the
/// check itself never opens a connection to the backend.
#[derive(Debug)]
pub struct SystemConnectivity {
    online: AtomicBool,
}

impl Default for SystemConnectivity {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }
}

impl SystemConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connectivity for SystemConnectivity {
    async fn preflight(&self, base_url: &str) -> Result<(), PortalError> {
        if !self.is_online() {
            warn!("Pre-flight: network reported offline");
            return Err(PortalError::NetworkUnavailable);
        }

        let url = Url::parse(base_url)
            .map_err(|e| PortalError::Io(format!("invalid base URL {base_url}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| PortalError::Io(format!("base URL has no host: {base_url}")))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(443);

        let resolved = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map(|mut addrs| addrs.next().is_some());
        match resolved {
            Ok(true) => {
                debug!(host = %host, "Pre-flight: host resolved");
                Ok(())
            }
            Ok(false) => Err(PortalError::DnsUnresolved(host)),
            Err(e) => {
                warn!(host = %host, error = %e, "Pre-flight: DNS lookup failed");
                Err(PortalError::DnsUnresolved(host))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_fails_fast() {
        let c = SystemConnectivity::new();
        c.set_online(false);
        let err = c.preflight("https://portal.example").await.unwrap_err();
        assert!(matches!(err, PortalError::NetworkUnavailable));
    }

    #[tokio::test]
    async fn ip_literal_resolves() {
        let c = SystemConnectivity::new();
        assert!(c.preflight("http://127.0.0.1:8080").await.is_ok());
    }

    #[tokio::test]
    async fn unresolvable_host_is_dns_error() {
        let c = SystemConnectivity::new();
        let err = c.preflight("https://no-such-host.invalid").await.unwrap_err();
        assert!(matches!(err, PortalError::DnsUnresolved(h) if h == "no-such-host.invalid"));
    }

    #[tokio::test]
    async fn garbage_url_is_rejected() {
        let c = SystemConnectivity::new();
        assert!(c.preflight("::::").await.is_err());
    }
}
