//! Form login against the backend.
//!
//! The engine only authenticates. Persisting the resulting session is the
//! session manager's job, so a cancelled login commits nothing.

use std::sync::Arc;

use chrono::Duration;
use portalchat_core::{
    cookie_pair, join_url, Connectivity, Credentials, HttpRequest, HttpResponse, HttpTransport,
    PortalError, Session,
};
use portalchat_logging::{EventLogger, PortalEvent};
use tracing::{debug, info, warn};
use url::Url;

use crate::discovery::{DiscoveryCache, EndpointDiscovery};

/// Phrases the backend renders on a failed login that still returns 200.
const LOGIN_ERROR_PHRASES: &[&str] = &[
    "帳號或密碼錯誤",
    "密碼錯誤",
    "登入失敗",
    "Invalid username or password",
    "login failed",
];

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub fallback_login_path: String,
    pub locale: String,
    pub keep_logged_in: bool,
    pub session_ttl: Duration,
}

pub struct AuthEngine {
    transport: Arc<dyn HttpTransport>,
    connectivity: Arc<dyn Connectivity>,
    discovery: EndpointDiscovery,
    settings: AuthSettings,
}

impl AuthEngine {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        connectivity: Arc<dyn Connectivity>,
        discovery: EndpointDiscovery,
        settings: AuthSettings,
    ) -> Self {
        Self {
            transport,
            connectivity,
            discovery,
            settings,
        }
    }

    pub async fn login(
        &self,
        credentials: &Credentials,
        cache: &DiscoveryCache,
    ) -> Result<Session, PortalError> {
        let base_url = credentials.base_url.trim_end_matches('/');
        EventLogger::log_event(PortalEvent::LoginAttempt {
            username: credentials.username.clone(),
            base_url: base_url.to_string(),
        });

        let result = self.authenticate(credentials, base_url, cache).await;

        EventLogger::log_event(PortalEvent::LoginFinished {
            username: credentials.username.clone(),
            success: result.is_ok(),
            detail: match &result {
                Ok(_) => "session established".to_string(),
                Err(e) => e.to_string(),
            },
        });
        result
    }

    async fn authenticate(
        &self,
        credentials: &Credentials,
        base_url: &str,
        cache: &DiscoveryCache,
    ) -> Result<Session, PortalError> {
        self.connectivity.preflight(base_url).await?;

        let login_url = join_url(base_url, &self.resolve_login_path(base_url, cache).await);

        let page = self.transport.execute(HttpRequest::get(&login_url)).await?;
        if !page.is_success() {
            return Err(PortalError::CannotFetchLoginPage(page.status));
        }
        let pre_session = page
            .header_values("Set-Cookie")
            .find_map(cookie_pair)
            .map(str::to_string);

        let request = HttpRequest::post(&login_url)
            .header("Origin", origin_of(base_url))
            .header("Referer", &login_url)
            .cookie(pre_session.as_deref())
            .form(vec![
                ("loginName".to_string(), credentials.username.clone()),
                ("intumitPswd".to_string(), credentials.password.clone()),
                ("selectedLocale".to_string(), self.settings.locale.clone()),
                (
                    "keepLogin".to_string(),
                    self.settings.keep_logged_in.to_string(),
                ),
            ]);
        let response = self.transport.execute(request).await?;

        match response.status {
            302 => {
                let location = response.header("Location").unwrap_or_default();
                if redirects_to_login(&login_url, location) {
                    info!(location = %location, "Login redirected back to the login page");
                    return Err(PortalError::InvalidCredentials);
                }
            }
            200 => {
                if contains_error_phrase(&response.body) || has_login_form(&response.body) {
                    info!("Login page re-rendered; credentials rejected");
                    return Err(PortalError::InvalidCredentials);
                }
            }
            other => {
                warn!(status = other, "Unexpected login response status");
                return Err(PortalError::UnexpectedStatus(other));
            }
        }

        let cookie = session_cookie(&response, pre_session.as_deref());
        if cookie.is_empty() {
            debug!("Login succeeded without cookies; relying on the transport jar");
        }
        Ok(Session::new(cookie).with_ttl(self.settings.session_ttl))
    }

    async fn resolve_login_path(&self, base_url: &str, cache: &DiscoveryCache) -> String {
        let endpoints = match cache.get(base_url).await {
            Some(cached) => cached,
            None => {
                let found = self.discovery.discover(base_url).await;
                cache.store(base_url, found.clone()).await;
                found
            }
        };
        endpoints
            .login_path
            .unwrap_or_else(|| self.settings.fallback_login_path.clone())
    }
}

/// Every `Set-Cookie` pair joined with `; `, or the pre-session cookie when
/// the response set none.
fn session_cookie(response: &HttpResponse, pre_session: Option<&str>) -> String {
    let pairs: Vec<&str> = response
        .header_values("Set-Cookie")
        .filter_map(cookie_pair)
        .collect();
    if pairs.is_empty() {
        pre_session.unwrap_or_default().to_string()
    } else {
        pairs.join("; ")
    }
}

/// The `Location` path, resolved against the login URL, is still a login
/// path. The host is ignored so a backend named `login.example` works.
fn redirects_to_login(login_url: &str, location: &str) -> bool {
    let path = Url::parse(login_url)
        .and_then(|base| base.join(location))
        .map(|target| target.path().to_string())
        .unwrap_or_else(|_| location.to_string());
    path.to_lowercase().contains("login")
}

fn contains_error_phrase(body: &str) -> bool {
    let lower = body.to_lowercase();
    LOGIN_ERROR_PHRASES
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
}

fn has_login_form(body: &str) -> bool {
    let lower = body.to_lowercase();
    body.contains("loginName")
        && body.contains("intumitPswd")
        && (lower.contains(r#"type="password""#) || lower.contains("type='password'"))
}

fn origin_of(base_url: &str) -> String {
    Url::parse(base_url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| base_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{html, AlwaysOnline, Offline, ScriptedTransport, LOGIN_PAGE};
    use portalchat_config::BackendPaths;
    use portalchat_core::{DiscoveredEndpoints, Method};

    const BASE: &str = "https://portal.example.com";
    const LOGIN_PATH: &str = "/wise/wiseadm/s/login";

    fn engine(transport: &Arc<ScriptedTransport>, connectivity: Arc<dyn Connectivity>) -> AuthEngine {
        AuthEngine::new(
            transport.clone(),
            connectivity,
            EndpointDiscovery::new(transport.clone(), BackendPaths::default()),
            AuthSettings {
                fallback_login_path: LOGIN_PATH.to_string(),
                locale: "zh_TW".to_string(),
                keep_logged_in: true,
                session_ttl: Duration::hours(24),
            },
        )
    }

    async fn cache_with_login_path() -> DiscoveryCache {
        let cache = DiscoveryCache::new();
        cache
            .store(
                BASE,
                DiscoveredEndpoints {
                    login_path: Some(LOGIN_PATH.to_string()),
                    discovery_success: true,
                    ..Default::default()
                },
            )
            .await;
        cache
    }

    fn creds() -> Credentials {
        Credentials::new("alice", "s3cret", BASE)
    }

    fn login_page() -> HttpResponse {
        html(200, LOGIN_PAGE).with_header("Set-Cookie", "JSESSIONID=pre; Path=/; HttpOnly")
    }

    #[tokio::test]
    async fn redirect_away_from_login_is_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, LOGIN_PATH, login_page()).on(
            Method::Post,
            LOGIN_PATH,
            HttpResponse::new(302, "")
                .with_header("Location", "/dashboard")
                .with_header("Set-Cookie", "JSESSIONID=fresh; Path=/; HttpOnly")
                .with_header("Set-Cookie", "ROUTEID=node2; Path=/"),
        );

        let session = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap();
        assert_eq!(session.cookie, "JSESSIONID=fresh; ROUTEID=node2");

        let post = transport
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Post)
            .unwrap();
        assert_eq!(post.form_value("loginName"), Some("alice"));
        assert_eq!(post.form_value("intumitPswd"), Some("s3cret"));
        assert_eq!(post.form_value("selectedLocale"), Some("zh_TW"));
        assert_eq!(post.form_value("keepLogin"), Some("true"));
        assert_eq!(post.header_value("Cookie"), Some("JSESSIONID=pre"));
        assert_eq!(post.header_value("Origin"), Some(BASE));
        assert_eq!(post.header_value("Referer"), Some(&*format!("{BASE}{LOGIN_PATH}")));
    }

    #[tokio::test]
    async fn login_named_host_is_judged_by_redirect_path() {
        const HOST: &str = "https://login.corp.example";
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, LOGIN_PATH, login_page()).on(
            Method::Post,
            LOGIN_PATH,
            HttpResponse::new(302, "")
                .with_header("Location", "https://login.corp.example/wise/wiseadm/s/promptportal/portal")
                .with_header("Set-Cookie", "JSESSIONID=corp; Path=/"),
        );
        let cache = DiscoveryCache::new();
        cache
            .store(
                HOST,
                DiscoveredEndpoints {
                    login_path: Some(LOGIN_PATH.to_string()),
                    discovery_success: true,
                    ..Default::default()
                },
            )
            .await;

        let session = engine(&transport, Arc::new(AlwaysOnline))
            .login(&Credentials::new("alice", "s3cret", HOST), &cache)
            .await
            .unwrap();
        assert_eq!(session.cookie, "JSESSIONID=corp");
    }

    #[test]
    fn redirect_target_path_decides_login() {
        let login_url = format!("https://login.corp.example{LOGIN_PATH}");
        assert!(!redirects_to_login(&login_url, "https://login.corp.example/home"));
        assert!(!redirects_to_login(&login_url, "/dashboard"));
        assert!(redirects_to_login(&login_url, "https://login.corp.example/wise/wiseadm/s/login?err=1"));
        assert!(redirects_to_login(&login_url, "/Login?error=1"));
        assert!(redirects_to_login(&login_url, "login.jsp"));
    }

    #[tokio::test]
    async fn redirect_back_to_login_is_invalid_credentials() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, LOGIN_PATH, login_page()).on(
            Method::Post,
            LOGIN_PATH,
            HttpResponse::new(302, "").with_header("Location", "/login?error=1"),
        );

        let err = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));
    }

    #[tokio::test]
    async fn rerendered_login_form_is_invalid_credentials() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(Method::Get, LOGIN_PATH, login_page())
            .on(Method::Post, LOGIN_PATH, html(200, LOGIN_PAGE));

        let err = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));

        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, LOGIN_PATH, login_page()).on(
            Method::Post,
            LOGIN_PATH,
            html(200, "<div class='error'>帳號或密碼錯誤</div>"),
        );
        let err = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));
    }

    #[tokio::test]
    async fn plain_200_keeps_pre_session_cookie() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(Method::Get, LOGIN_PATH, login_page())
            .on(Method::Post, LOGIN_PATH, html(200, "<html><body>Welcome</body></html>"));

        let session = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap();
        assert_eq!(session.cookie, "JSESSIONID=pre");
    }

    #[tokio::test]
    async fn login_page_failure_and_unexpected_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, LOGIN_PATH, HttpResponse::new(503, ""));
        let err = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::CannotFetchLoginPage(503)));

        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(Method::Get, LOGIN_PATH, login_page())
            .on(Method::Post, LOGIN_PATH, HttpResponse::new(500, "oops"));
        let err = engine(&transport, Arc::new(AlwaysOnline))
            .login(&creds(), &cache_with_login_path().await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::UnexpectedStatus(500)));
    }

    #[tokio::test]
    async fn offline_fails_before_any_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = engine(&transport, Arc::new(Offline))
            .login(&creds(), &DiscoveryCache::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NetworkUnavailable));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn discovery_runs_once_and_is_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on(
                Method::Get,
                BASE,
                HttpResponse::new(302, "").with_header("Location", "/custom/login"),
            )
            .on(Method::Get, "/custom/login", login_page())
            .on(
                Method::Post,
                "/custom/login",
                HttpResponse::new(302, "").with_header("Location", "/home"),
            );

        let cache = DiscoveryCache::new();
        let auth = engine(&transport, Arc::new(AlwaysOnline));
        auth.login(&creds(), &cache).await.unwrap();
        assert_eq!(
            cache.get(BASE).await.and_then(|e| e.login_path).as_deref(),
            Some("/custom/login")
        );

        let landing_fetches = transport
            .calls()
            .iter()
            .filter(|c| c.method == Method::Get && c.url == BASE)
            .count();
        auth.login(&creds(), &cache).await.unwrap();
        let landing_fetches_after = transport
            .calls()
            .iter()
            .filter(|c| c.method == Method::Get && c.url == BASE)
            .count();
        assert_eq!(landing_fetches, 1);
        assert_eq!(landing_fetches_after, 1);
    }
}
