//! `PortalClient`: the one object a UI layer talks to.

use std::sync::Arc;

use chrono::Duration;
use portalchat_config::PortalChatConfig;
use portalchat_core::{
    AvailablePortalIds, ChatResponse, Connectivity, CredentialVault, Credentials, ErrorKind,
    HttpTransport, LoginResult, PortalAvailability, PortalError, PortalId, PortalListResult,
    SessionStore,
};
use portalchat_logging::{EventLogger, PortalEvent};
use tracing::{debug, info, warn};

use crate::access_prober::PortalAccessProber;
use crate::auth::{AuthEngine, AuthSettings};
use crate::classifier::{HeuristicClassifier, ResponseClassifier};
use crate::discovery::{DiscoveryCache, EndpointDiscovery};
use crate::dispatch::{ChatDispatcher, ChatRequest, DispatchSettings};
use crate::messages;
use crate::portal_list::PortalListDiscovery;
use crate::session::SessionManager;

/// Shared collaborators supplied by the host application.
pub struct Collaborators {
    pub transport: Arc<dyn HttpTransport>,
    pub connectivity: Arc<dyn Connectivity>,
    pub store: Arc<dyn SessionStore>,
    pub vault: Arc<dyn CredentialVault>,
}

pub struct PortalClient {
    config: PortalChatConfig,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<DiscoveryCache>,
    auth: Arc<AuthEngine>,
    sessions: Arc<SessionManager>,
    dispatcher: ChatDispatcher,
    portal_list: PortalListDiscovery,
}

impl PortalClient {
    pub fn from_config(config: &PortalChatConfig, collaborators: Collaborators) -> Self {
        let classifier = Arc::new(HeuristicClassifier::new(
            config.portals.lenient_plaintext_replies,
        ));
        Self::with_classifier(config, collaborators, classifier)
    }

    pub fn with_classifier(
        config: &PortalChatConfig,
        collaborators: Collaborators,
        classifier: Arc<dyn ResponseClassifier>,
    ) -> Self {
        let Collaborators {
            transport,
            connectivity,
            store,
            vault,
        } = collaborators;
        let ttl = Duration::hours(config.session.ttl_hours);
        let cache = Arc::new(DiscoveryCache::new());

        let auth = Arc::new(AuthEngine::new(
            transport.clone(),
            connectivity,
            EndpointDiscovery::new(transport.clone(), config.backend.paths.clone()),
            AuthSettings {
                fallback_login_path: config.backend.paths.fallback_login_path.clone(),
                locale: config.backend.locale.clone(),
                keep_logged_in: config.backend.keep_logged_in,
                session_ttl: ttl,
            },
        ));
        let sessions = Arc::new(SessionManager::new(store, vault, ttl));

        let dispatcher = ChatDispatcher::new(
            transport.clone(),
            classifier,
            auth.clone(),
            sessions.clone(),
            cache.clone(),
            DispatchSettings {
                mode: config.backend.mode,
                default_portal_id: PortalId::new(config.portals.default_portal_id.as_str()),
                fallback_portal_ids: to_ids(&config.portals.fallback_portal_ids),
                completion_path: format!(
                    "{}/completion",
                    config.backend.paths.portal_base_path.trim_end_matches('/')
                ),
            },
        );

        Self {
            config: config.clone(),
            portal_list: PortalListDiscovery::new(transport.clone()),
            transport,
            cache,
            auth,
            sessions,
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn discovery_cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &ChatDispatcher {
        &self.dispatcher
    }

    /// Authenticate, persist the session, then resolve which portals the
    /// account may submit to.
    pub async fn login(&self, credentials: &Credentials) -> LoginResult {
        let session = match self.auth.login(credentials, &self.cache).await {
            Ok(session) => session,
            Err(e) => return login_failure(&e),
        };
        if let Err(e) = self.sessions.commit_login(credentials, &session).await {
            return login_failure(&e);
        }

        let base_url = credentials.base_url.trim_end_matches('/');
        match self.resolve_availability(base_url, &session.cookie).await {
            Ok(PortalAvailability::NoSubmitPermission) => {
                let err = PortalError::InsufficientPortalPermissions;
                LoginResult {
                    success: true,
                    message: messages::error_message(&err),
                    error_kind: Some(err.kind()),
                    availability: Some(PortalAvailability::NoSubmitPermission),
                }
            }
            Ok(availability) => LoginResult {
                success: true,
                message: format!(
                    "Logged in as {}; portals: {}",
                    credentials.username,
                    join_ids(availability.ids())
                ),
                error_kind: None,
                availability: Some(availability),
            },
            Err(e) => login_failure(&e),
        }
    }

    pub async fn logout(&self) -> Result<(), PortalError> {
        self.cache.invalidate().await;
        self.transport.clear_cookies().await;
        self.sessions.logout().await
    }

    /// Published portals visible to the current session.
    pub async fn list_portals(&self) -> PortalListResult {
        let context = match self.session_context().await {
            Ok(Some(context)) => context,
            Ok(None) => {
                return PortalListResult {
                    portals: Vec::new(),
                    success: false,
                    message: messages::LOGIN_REQUIRED.to_string(),
                }
            }
            Err(e) => {
                return PortalListResult {
                    portals: Vec::new(),
                    success: false,
                    message: messages::error_message(&e),
                }
            }
        };
        let portal_base = self.portal_base_path(&context.0).await;
        self.portal_list
            .discover_portals(&context.0, &context.1, &portal_base)
            .await
    }

    /// Re-run availability discovery with the current session.
    pub async fn refresh_availability(&self) -> Result<PortalAvailability, PortalError> {
        let (base_url, cookie) = self
            .session_context()
            .await?
            .ok_or(PortalError::SessionExpired)?;
        self.resolve_availability(&base_url, &cookie).await
    }

    /// Send as the stored account. The stored session cookie is used even
    /// when the vault holds no password; only a needed re-login fails then.
    pub async fn send_chat_message(&self, request: &ChatRequest) -> ChatResponse {
        match self.dispatch_credentials().await {
            Ok(Some(credentials)) => self.dispatcher.send_chat_message(&credentials, request).await,
            Ok(None) => ChatResponse::failure(ErrorKind::LoginRequired, messages::LOGIN_REQUIRED),
            Err(e) => ChatResponse::failure(e.kind(), messages::error_message(&e)),
        }
    }

    /// List API first, brute-force prober second, then the configured
    /// read-only fallback.
    async fn resolve_availability(
        &self,
        base_url: &str,
        cookie: &str,
    ) -> Result<PortalAvailability, PortalError> {
        let portal_base = self.portal_base_path(base_url).await;

        let listed = self
            .portal_list
            .discover_portals(base_url, cookie, &portal_base)
            .await;
        let mut ids: Vec<PortalId> = if listed.success {
            listed.portals.iter().map(|p| p.id.clone()).collect()
        } else {
            info!(reason = %listed.message, "Portal list unavailable; probing ids");
            Vec::new()
        };

        if ids.is_empty() {
            let prober = PortalAccessProber::new(
                self.transport.clone(),
                portal_base,
                to_ids(&self.config.portals.probe_candidates),
                self.config.portals.max_confirmed,
            );
            ids = prober.discover_available_portal_ids(cookie, base_url).await;
        }

        let fallback = to_ids(&self.config.portals.fallback_portal_ids);
        let availability = if !ids.is_empty() {
            PortalAvailability::Writable(AvailablePortalIds::new(ids))
        } else if !fallback.is_empty() {
            warn!("No writable portal confirmed; falling back to unconfirmed ids");
            PortalAvailability::StaleFallback(fallback)
        } else {
            PortalAvailability::NoSubmitPermission
        };

        self.sessions.save_availability(&availability).await?;
        EventLogger::log_event(PortalEvent::AvailabilityResolved {
            state: availability.tag().to_string(),
            portal_ids: availability.ids().iter().map(PortalId::to_string).collect(),
        });
        Ok(availability)
    }

    /// Stored credentials, or the stored account with an empty password
    /// when the vault has expired or belongs to another process.
    async fn dispatch_credentials(&self) -> Result<Option<Credentials>, PortalError> {
        if let Some(credentials) = self.sessions.stored_credentials().await? {
            return Ok(Some(credentials));
        }
        let username = self.sessions.stored_username().await?;
        let base_url = self.sessions.stored_base_url().await?;
        Ok(match (username, base_url) {
            (Some(username), Some(base_url)) => {
                debug!(username = %username, "No cached password; sending with the stored session");
                Some(Credentials::new(username, "", base_url))
            }
            _ => None,
        })
    }

    async fn session_context(&self) -> Result<Option<(String, String)>, PortalError> {
        let Some(session) = self.sessions.current_session().await? else {
            return Ok(None);
        };
        let base_url = match self.sessions.stored_base_url().await? {
            Some(url) => url,
            None => match &self.config.backend.base_url {
                Some(url) => url.trim_end_matches('/').to_string(),
                None => return Ok(None),
            },
        };
        Ok(Some((base_url, session.cookie)))
    }

    async fn portal_base_path(&self, base_url: &str) -> String {
        self.cache
            .get(base_url)
            .await
            .and_then(|e| e.portal_base_path)
            .unwrap_or_else(|| self.config.backend.paths.portal_base_path.clone())
    }
}

fn login_failure(err: &PortalError) -> LoginResult {
    LoginResult {
        success: false,
        message: messages::error_message(err),
        error_kind: Some(err.kind()),
        availability: None,
    }
}

fn to_ids(raw: &[String]) -> Vec<PortalId> {
    raw.iter()
        .map(|s| PortalId::new(s.as_str()))
        .filter(|id| !id.as_str().is_empty())
        .collect()
}

fn join_ids(ids: &[PortalId]) -> String {
    ids.iter().map(PortalId::as_str).collect::<Vec<_>>().join(", ")
}
