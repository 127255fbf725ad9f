//! Session state in the key/value store, plus the short-lived password vault.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use portalchat_core::{
    AvailablePortalIds, CredentialVault, Credentials, PortalAvailability, PortalError, PortalId,
    Session, SessionStore,
};
use tracing::{debug, info};

pub const KEY_SESSION_COOKIE: &str = "session_cookie";
pub const KEY_USERNAME: &str = "username";
pub const KEY_BASE_URL: &str = "base_url";
pub const KEY_LOGIN_TIMESTAMP: &str = "login_timestamp";
pub const KEY_AVAILABLE_PORTAL_IDS: &str = "available_portal_ids";
pub const KEY_DEFAULT_PORTAL_ID: &str = "default_portal_id";
pub const KEY_PORTAL_ACCESS: &str = "portal_access";

const ALL_KEYS: &[&str] = &[
    KEY_SESSION_COOKIE,
    KEY_USERNAME,
    KEY_BASE_URL,
    KEY_LOGIN_TIMESTAMP,
    KEY_AVAILABLE_PORTAL_IDS,
    KEY_DEFAULT_PORTAL_ID,
    KEY_PORTAL_ACCESS,
];

fn storage(err: anyhow::Error) -> PortalError {
    PortalError::Storage(format!("{err:#}"))
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    vault: Arc<dyn CredentialVault>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, vault: Arc<dyn CredentialVault>, ttl: Duration) -> Self {
        Self { store, vault, ttl }
    }

    /// Persist a fresh login. Store keys are written in one `set_many`.
    pub async fn commit_login(
        &self,
        credentials: &Credentials,
        session: &Session,
    ) -> Result<(), PortalError> {
        self.vault
            .store(&credentials.username, &credentials.password, self.ttl)
            .await
            .map_err(storage)?;
        self.store
            .set_many(&[
                (KEY_SESSION_COOKIE, session.cookie.clone()),
                (KEY_USERNAME, credentials.username.clone()),
                (
                    KEY_BASE_URL,
                    credentials.base_url.trim_end_matches('/').to_string(),
                ),
                (KEY_LOGIN_TIMESTAMP, session.created_at.to_rfc3339()),
            ])
            .await
            .map_err(storage)?;
        info!(username = %credentials.username, "Session committed");
        Ok(())
    }

    /// Replace the cookie and timestamp after a silent re-login. The vault
    /// entry is re-stored so it lives as long as the new session.
    pub async fn refresh_session(
        &self,
        credentials: &Credentials,
        session: &Session,
    ) -> Result<(), PortalError> {
        self.vault
            .store(&credentials.username, &credentials.password, self.ttl)
            .await
            .map_err(storage)?;
        self.store
            .set_many(&[
                (KEY_SESSION_COOKIE, session.cookie.clone()),
                (KEY_LOGIN_TIMESTAMP, session.created_at.to_rfc3339()),
            ])
            .await
            .map_err(storage)?;
        debug!("Session refreshed");
        Ok(())
    }

    /// The stored session if it is still inside its TTL. Expired session
    /// keys are purged on read.
    pub async fn current_session(&self) -> Result<Option<Session>, PortalError> {
        self.current_session_at(Utc::now()).await
    }

    pub async fn current_session_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, PortalError> {
        let cookie = self.store.get(KEY_SESSION_COOKIE).await.map_err(storage)?;
        let stamp = self.store.get(KEY_LOGIN_TIMESTAMP).await.map_err(storage)?;
        let (Some(cookie), Some(stamp)) = (cookie, stamp) else {
            return Ok(None);
        };

        let created_at = match DateTime::parse_from_rfc3339(&stamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                debug!(error = %e, "Unreadable login timestamp; treating session as expired");
                self.purge_session().await?;
                return Ok(None);
            }
        };

        let session = Session::new(cookie)
            .with_created_at(created_at)
            .with_ttl(self.ttl);
        if session.is_valid_at(now) {
            Ok(Some(session))
        } else {
            info!(created_at = %created_at, "Stored session expired");
            self.purge_session().await?;
            Ok(None)
        }
    }

    async fn purge_session(&self) -> Result<(), PortalError> {
        self.store.remove(KEY_SESSION_COOKIE).await.map_err(storage)?;
        self.store.remove(KEY_LOGIN_TIMESTAMP).await.map_err(storage)
    }

    /// Username and base URL from the store, password from the vault.
    pub async fn stored_credentials(&self) -> Result<Option<Credentials>, PortalError> {
        let Some(username) = self.store.get(KEY_USERNAME).await.map_err(storage)? else {
            return Ok(None);
        };
        let Some(base_url) = self.store.get(KEY_BASE_URL).await.map_err(storage)? else {
            return Ok(None);
        };
        let password = self.vault.load(&username).await.map_err(storage)?;
        Ok(password.map(|password| Credentials::new(username, password, base_url)))
    }

    pub async fn stored_base_url(&self) -> Result<Option<String>, PortalError> {
        self.store.get(KEY_BASE_URL).await.map_err(storage)
    }

    pub async fn stored_username(&self) -> Result<Option<String>, PortalError> {
        self.store.get(KEY_USERNAME).await.map_err(storage)
    }

    pub async fn save_availability(
        &self,
        availability: &PortalAvailability,
    ) -> Result<(), PortalError> {
        let ids = availability
            .ids()
            .iter()
            .map(PortalId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let default_id = match availability {
            PortalAvailability::Writable(ids) => ids
                .default_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        self.store
            .set_many(&[
                (KEY_AVAILABLE_PORTAL_IDS, ids),
                (KEY_DEFAULT_PORTAL_ID, default_id),
                (KEY_PORTAL_ACCESS, availability.tag().to_string()),
            ])
            .await
            .map_err(storage)
    }

    pub async fn availability(&self) -> Result<Option<PortalAvailability>, PortalError> {
        let Some(tag) = self.store.get(KEY_PORTAL_ACCESS).await.map_err(storage)? else {
            return Ok(None);
        };
        let ids: Vec<PortalId> = self
            .store
            .get(KEY_AVAILABLE_PORTAL_IDS)
            .await
            .map_err(storage)?
            .unwrap_or_default()
            .split(',')
            .map(PortalId::new)
            .filter(|id| !id.as_str().is_empty())
            .collect();

        Ok(match tag.as_str() {
            "writable" => Some(PortalAvailability::Writable(AvailablePortalIds::new(ids))),
            "stale" => Some(PortalAvailability::StaleFallback(ids)),
            "none" => Some(PortalAvailability::NoSubmitPermission),
            other => {
                debug!(tag = %other, "Unknown portal access tag");
                None
            }
        })
    }

    pub async fn default_portal_id(&self) -> Result<Option<PortalId>, PortalError> {
        Ok(self
            .store
            .get(KEY_DEFAULT_PORTAL_ID)
            .await
            .map_err(storage)?
            .map(PortalId::new)
            .filter(|id| !id.as_str().is_empty()))
    }

    /// Remove every session key and clear the vault.
    pub async fn logout(&self) -> Result<(), PortalError> {
        for key in ALL_KEYS {
            self.store.remove(key).await.map_err(storage)?;
        }
        self.vault.clear().await.map_err(storage)?;
        info!("Session cleared");
        Ok(())
    }
}
