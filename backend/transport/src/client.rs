use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use portalchat_core::{HttpRequest, HttpResponse, HttpTransport, Method, PortalError};

use crate::cookie_jar::{merge_cookie_headers, PortalCookieJar};
use crate::retry::RetryPolicy;

/// Knobs for building a [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
            user_agent: "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0 Mobile Safari/537.36"
                .to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// reqwest-backed transport with a shared origin-keyed cookie jar.
///
/// Redirects are never followed: the login flow needs to see the 302 and
/// its `Location` header.
pub struct ReqwestTransport {
    client: Client,
    jar: Arc<PortalCookieJar>,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        Self::with_jar(settings, Arc::new(PortalCookieJar::new()))
    }

    pub fn with_jar(settings: TransportSettings, jar: Arc<PortalCookieJar>) -> Result<Self> {
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::none())
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent)
            .build()
            .context("Failed to build reqwest client for ReqwestTransport")?;
        Ok(Self {
            client,
            jar,
            retry: settings.retry,
        })
    }

    pub fn cookie_jar(&self) -> Arc<PortalCookieJar> {
        Arc::clone(&self.jar)
    }

    async fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
        let url = Url::parse(&request.url)
            .map_err(|e| PortalError::Io(format!("invalid URL {}: {e}", request.url)))?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Head => self.client.head(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };

        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("cookie") {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                warn!(header = %name, "Dropping header with invalid characters");
                continue;
            };
            builder = builder.header(name, value);
        }

        let jar_cookies = self.jar.header_for(&url);
        if let Some(cookie) = merge_cookie_headers(request.header_value("Cookie"), jar_cookies.as_deref()) {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                builder = builder.header(COOKIE, value);
            }
        }

        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = if request.method == Method::Head {
            String::new()
        } else {
            response.text().await.map_err(map_reqwest_error)?
        };

        debug!(method = %request.method, url = %request.url, status, "HTTP round trip");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, PortalError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.execute_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if self.retry.should_retry(request.method, &e, attempts) => {
                    let delay = self.retry.delay_for(attempts);
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn clear_cookies(&self) {
        self.jar.clear();
        debug!("Cookie jar cleared");
    }
}

/// Map a reqwest failure into the network taxonomy.
fn map_reqwest_error(err: reqwest::Error) -> PortalError {
    if err.is_timeout() {
        return PortalError::ConnectTimeout;
    }

    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }
    let lowered = chain.to_lowercase();

    if err.is_connect() {
        let host = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or_default()
            .to_string();
        if lowered.contains("dns")
            || lowered.contains("failed to lookup")
            || lowered.contains("name or service not known")
            || lowered.contains("no such host")
        {
            return PortalError::DnsUnresolved(host);
        }
        if lowered.contains("refused") {
            return PortalError::ConnectRefused(host);
        }
    }
    PortalError::Io(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(TransportSettings {
            retry: RetryPolicy::none(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn jar_cookies_are_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Set-Cookie", "JSESSIONID=abc; Path=/; HttpOnly"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .and(header("cookie", "JSESSIONID=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let t = transport();
        t.execute(HttpRequest::get(format!("{}/login", server.uri())))
            .await
            .unwrap();
        let resp = t
            .execute(HttpRequest::get(format!("{}/check", server.uri())))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "ok");
    }

    #[tokio::test]
    async fn cleared_jar_sends_no_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Set-Cookie", "JSESSIONID=abc; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let t = transport();
        t.execute(HttpRequest::get(format!("{}/login", server.uri())))
            .await
            .unwrap();
        t.clear_cookies().await;
        t.execute(HttpRequest::get(format!("{}/check", server.uri())))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let check = received.last().unwrap();
        assert_eq!(check.url.path(), "/check");
        assert!(check.headers.get("cookie").is_none());
        let check_url = Url::parse(check.url.as_str()).unwrap();
        assert!(t.cookie_jar().header_for(&check_url).is_none());
    }

    #[tokio::test]
    async fn redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("loginName=alice"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/dashboard")
                    .insert_header("Set-Cookie", "SESSION=xyz; Path=/"),
            )
            .mount(&server)
            .await;

        let resp = transport()
            .execute(
                HttpRequest::post(format!("{}/login", server.uri()))
                    .form(vec![("loginName".into(), "alice".into())]),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 302);
        assert_eq!(resp.header("location"), Some("/dashboard"));
        assert_eq!(resp.header_values("set-cookie").count(), 1);
    }

    #[tokio::test]
    async fn refused_connection_maps_to_network_error() {
        let err = transport()
            .execute(HttpRequest::get("http://127.0.0.1:1/"))
            .await
            .unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn invalid_url_is_reported() {
        let err = transport()
            .execute(HttpRequest::get("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Io(_)));
    }
}
