//! Chat dispatch: select a portal id, send, classify, and recover by one
//! re-login or by cycling through alternative portal ids.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use portalchat_core::{
    join_url, Attachment, BackendMode, ChatResponse, Credentials, ErrorKind, HttpRequest,
    HttpTransport, PortalAvailability, PortalConfig, PortalError, PortalId, EMPTY_UPLOAD_MARKER,
};
use portalchat_logging::{EventLogger, PortalEvent};
use tracing::{debug, info, warn};

use crate::auth::AuthEngine;
use crate::classifier::{Classification, ResponseClassifier};
use crate::discovery::DiscoveryCache;
use crate::messages;
use crate::session::SessionManager;

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub attachment: Option<Attachment>,
    pub portal_config: Option<PortalConfig>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_portal_config(mut self, config: PortalConfig) -> Self {
        self.portal_config = Some(config);
        self
    }

    /// Custom portal parameters verbatim, else the default prompt/upload pair.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        if let Some(config) = self.portal_config.as_ref().filter(|c| !c.parameters.is_empty()) {
            return config
                .parameters
                .iter()
                .map(|(name, param)| (name.clone(), param.value.clone()))
                .collect();
        }
        let upload = self
            .attachment
            .as_ref()
            .map(Attachment::to_data_uri)
            .unwrap_or_else(|| EMPTY_UPLOAD_MARKER.to_string());
        vec![
            ("USERPROMPT".to_string(), self.message.clone()),
            ("USERUPLOADFILE".to_string(), upload),
        ]
    }

    fn explicit_portal_id(&self) -> Option<PortalId> {
        self.portal_config
            .as_ref()
            .map(|c| c.id.clone())
            .filter(|id| !id.as_str().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub mode: BackendMode,
    pub default_portal_id: PortalId,
    /// Read-only candidates used when nothing writable was confirmed.
    pub fallback_portal_ids: Vec<PortalId>,
    /// Used when discovery found no completion endpoint.
    pub completion_path: String,
}

#[derive(Debug)]
enum DispatchState {
    SelectingPortalId,
    Sending(PortalId),
    Reauthenticating(PortalId),
    TryingAlternative(PortalId),
    Exhausted(ErrorKind),
    Done(ChatResponse),
}

/// Mutable bookkeeping for one `send_chat_message` call.
#[derive(Default)]
struct DispatchContext {
    cookie: Option<String>,
    reauthenticated: bool,
    cycling: bool,
    pool: VecDeque<PortalId>,
    visited: HashSet<PortalId>,
    tried: Vec<PortalId>,
    stale_pool: bool,
}

pub struct ChatDispatcher {
    transport: Arc<dyn HttpTransport>,
    classifier: Arc<dyn ResponseClassifier>,
    auth: Arc<AuthEngine>,
    sessions: Arc<SessionManager>,
    cache: Arc<DiscoveryCache>,
    settings: DispatchSettings,
}

impl ChatDispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        classifier: Arc<dyn ResponseClassifier>,
        auth: Arc<AuthEngine>,
        sessions: Arc<SessionManager>,
        cache: Arc<DiscoveryCache>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            transport,
            classifier,
            auth,
            sessions,
            cache,
            settings,
        }
    }

    pub async fn send_chat_message(
        &self,
        credentials: &Credentials,
        request: &ChatRequest,
    ) -> ChatResponse {
        let base_url = credentials.base_url.trim_end_matches('/').to_string();
        let mut ctx = DispatchContext::default();
        let mut state = DispatchState::SelectingPortalId;

        loop {
            debug!(?state, "Dispatch step");
            state = match state {
                DispatchState::SelectingPortalId => match self.select(request, &mut ctx).await {
                    Ok(next) => next,
                    Err(e) => DispatchState::Done(failure_from(&e)),
                },

                DispatchState::Sending(id) => {
                    let outcome = self
                        .send_once(&base_url, ctx.cookie.as_deref(), &id, request)
                        .await;
                    match outcome {
                        Ok(Classification::Success { message, structured }) => {
                            if !structured {
                                warn!(portal_id = %id, "Reply was not JSON; returning raw body");
                            }
                            DispatchState::Done(ChatResponse::success(message))
                        }
                        Ok(Classification::LoginRequired) => {
                            if ctx.reauthenticated || ctx.cycling {
                                DispatchState::Done(ChatResponse::failure(
                                    ErrorKind::LoginRequired,
                                    messages::LOGIN_REQUIRED,
                                ))
                            } else {
                                DispatchState::Reauthenticating(id)
                            }
                        }
                        Ok(Classification::AccessDenied) => DispatchState::TryingAlternative(id),
                        Ok(Classification::HttpError { status }) => DispatchState::Done(
                            ChatResponse::failure(
                                ErrorKind::Http(status),
                                messages::http_status_message(status),
                            ),
                        ),
                        Ok(Classification::Malformed { preview }) => {
                            debug!(portal_id = %id, preview = %preview, "Malformed completion body");
                            DispatchState::Done(failure_from(
                                &PortalError::MalformedBackendResponse(preview),
                            ))
                        }
                        Err(e) => DispatchState::Done(failure_from(&e)),
                    }
                }

                DispatchState::Reauthenticating(id) => {
                    ctx.reauthenticated = true;
                    match self.reauthenticate(credentials, &id).await {
                        Ok(cookie) => {
                            ctx.cookie = Some(cookie);
                            DispatchState::Sending(id)
                        }
                        Err(e) => DispatchState::Done(failure_from(&e)),
                    }
                }

                DispatchState::TryingAlternative(denied) => {
                    ctx.cycling = true;
                    match next_alternative(&mut ctx) {
                        Some(next) => {
                            EventLogger::log_event(PortalEvent::PortalSwitch {
                                from: denied.to_string(),
                                to: next.to_string(),
                            });
                            DispatchState::Sending(next)
                        }
                        None => DispatchState::Exhausted(ErrorKind::AllPortalsAccessDenied),
                    }
                }

                DispatchState::Exhausted(kind) => DispatchState::Done(ChatResponse::failure(
                    kind,
                    messages::access_denied_guidance(
                        kind,
                        self.settings.mode,
                        ctx.stale_pool,
                        &ctx.tried,
                    ),
                )),

                DispatchState::Done(response) => return response,
            };
        }
    }

    /// Pick the first portal id and build the alternative pool. Without a
    /// valid local session the next step is a login, which uses up the single
    /// re-authentication.
    async fn select(
        &self,
        request: &ChatRequest,
        ctx: &mut DispatchContext,
    ) -> Result<DispatchState, PortalError> {
        let availability = self.sessions.availability().await?;
        let explicit = request.explicit_portal_id();

        if explicit.is_none() && availability == Some(PortalAvailability::NoSubmitPermission) {
            return Ok(DispatchState::Done(failure_from(
                &PortalError::InsufficientPortalPermissions,
            )));
        }

        let chosen = match explicit {
            Some(id) => id,
            None => self
                .sessions
                .default_portal_id()
                .await?
                .unwrap_or_else(|| self.settings.default_portal_id.clone()),
        };

        let (pool, stale) = match availability {
            Some(PortalAvailability::Writable(ids)) if !ids.is_empty() => {
                (ids.ids().to_vec(), false)
            }
            Some(PortalAvailability::StaleFallback(ids)) if !ids.is_empty() => (ids, true),
            _ => (self.settings.fallback_portal_ids.clone(), true),
        };
        if stale && !pool.is_empty() {
            warn!(
                pool = ?pool.iter().map(PortalId::as_str).collect::<Vec<_>>(),
                "Using unconfirmed fallback portal ids; these may 403 on POST"
            );
        }
        ctx.stale_pool = stale;
        ctx.pool = pool.into_iter().filter(|id| *id != chosen).collect();
        ctx.visited.insert(chosen.clone());
        ctx.tried.push(chosen.clone());

        match self.sessions.current_session().await? {
            Some(session) => {
                ctx.cookie = Some(session.cookie);
                Ok(DispatchState::Sending(chosen))
            }
            None => {
                info!("No valid session; logging in before sending");
                Ok(DispatchState::Reauthenticating(chosen))
            }
        }
    }

    async fn reauthenticate(
        &self,
        credentials: &Credentials,
        portal_id: &PortalId,
    ) -> Result<String, PortalError> {
        EventLogger::log_event(PortalEvent::Reauthenticating {
            portal_id: portal_id.to_string(),
        });

        let credentials = if credentials.password.is_empty() {
            self.sessions
                .stored_credentials()
                .await?
                .ok_or(PortalError::SessionExpired)?
        } else {
            credentials.clone()
        };

        let session = self.auth.login(&credentials, &self.cache).await?;
        let same_account = self.sessions.stored_username().await?.as_deref()
            == Some(credentials.username.as_str());
        if same_account {
            self.sessions.refresh_session(&credentials, &session).await?;
        } else {
            self.sessions.commit_login(&credentials, &session).await?;
        }
        Ok(session.cookie)
    }

    /// One completion POST with classification and no recovery.
    pub async fn send_to_portal(
        &self,
        base_url: &str,
        session_cookie: Option<&str>,
        portal_id: &PortalId,
        request: &ChatRequest,
    ) -> ChatResponse {
        match self.send_once(base_url, session_cookie, portal_id, request).await {
            Ok(Classification::Success { message, .. }) => ChatResponse::success(message),
            Ok(Classification::LoginRequired) => {
                ChatResponse::failure(ErrorKind::LoginRequired, messages::LOGIN_REQUIRED)
            }
            Ok(Classification::AccessDenied) => ChatResponse::failure(
                ErrorKind::PortalAccessDenied,
                messages::access_denied_guidance(
                    ErrorKind::PortalAccessDenied,
                    self.settings.mode,
                    false,
                    std::slice::from_ref(portal_id),
                ),
            ),
            Ok(Classification::HttpError { status }) => ChatResponse::failure(
                ErrorKind::Http(status),
                messages::http_status_message(status),
            ),
            Ok(Classification::Malformed { preview }) => {
                failure_from(&PortalError::MalformedBackendResponse(preview))
            }
            Err(e) => failure_from(&e),
        }
    }

    async fn send_once(
        &self,
        base_url: &str,
        session_cookie: Option<&str>,
        portal_id: &PortalId,
        request: &ChatRequest,
    ) -> Result<Classification, PortalError> {
        let url = self.completion_url(base_url, portal_id).await;
        let http_request = HttpRequest::post(&url)
            .header("Accept", "application/json, text/plain, */*")
            .cookie(session_cookie)
            .form(request.form_fields());

        let response = self.transport.execute(http_request).await?;
        let classification = self.classifier.classify(&response);

        EventLogger::log_event(PortalEvent::Classified {
            portal_id: portal_id.to_string(),
            status: response.status,
            outcome: classification.label().to_string(),
        });
        Ok(classification)
    }

    async fn completion_url(&self, base_url: &str, portal_id: &PortalId) -> String {
        let path = self
            .cache
            .get(base_url)
            .await
            .and_then(|e| e.completion_endpoint)
            .unwrap_or_else(|| self.settings.completion_path.clone());
        format!(
            "{}?id={}&action=completion",
            join_url(base_url, &path),
            portal_id
        )
    }
}

/// Next unvisited id from the pool, recording it as tried.
fn next_alternative(ctx: &mut DispatchContext) -> Option<PortalId> {
    while let Some(id) = ctx.pool.pop_front() {
        if ctx.visited.insert(id.clone()) {
            ctx.tried.push(id.clone());
            return Some(id);
        }
    }
    None
}

fn failure_from(err: &PortalError) -> ChatResponse {
    ChatResponse::failure(err.kind(), messages::error_message(err))
}
