//! Scripted in-process transport for driving the portal heuristics in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use portalchat_core::{Connectivity, HttpRequest, HttpResponse, HttpTransport, Method, PortalError};

#[derive(Clone)]
enum Reply {
    Response(HttpResponse),
    Refused,
}

struct Route {
    method: Method,
    pattern: String,
    replies: VecDeque<Reply>,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        if self.method != request.method {
            return false;
        }
        if self.pattern.starts_with("http://") || self.pattern.starts_with("https://") {
            request.url == self.pattern
        } else {
            request.url.contains(&self.pattern)
        }
    }
}

/// Routes match on method plus a pattern. A pattern that is a full URL
/// matches that URL exactly; any other pattern matches as a substring, and
/// the longest one wins. Each route replays its queue and repeats the last
/// reply. Unmatched requests get a 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<HttpRequest>>,
    cookie_clears: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, pattern: &str, response: HttpResponse) -> &Self {
        self.push(method, pattern, Reply::Response(response));
        self
    }

    pub fn refuse(&self, method: Method, pattern: &str) -> &Self {
        self.push(method, pattern, Reply::Refused);
        self
    }

    fn push(&self, method: Method, pattern: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern == pattern)
        {
            route.replies.push_back(reply);
        } else {
            routes.push(Route {
                method,
                pattern: pattern.to_string(),
                replies: VecDeque::from([reply]),
            });
        }
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cookie_clears(&self) -> usize {
        self.cookie_clears.load(Ordering::SeqCst)
    }

    pub fn count(&self, method: Method, url_contains: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.url.contains(url_contains))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, PortalError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .filter(|r| r.matches(&request))
                .max_by_key(|r| r.pattern.len());
            match route {
                Some(route) if route.replies.len() > 1 => route.replies.pop_front(),
                Some(route) => route.replies.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(resp)) => Ok(resp),
            Some(Reply::Refused) => Err(PortalError::ConnectRefused(request.url)),
            None => Ok(HttpResponse::new(404, "not found")),
        }
    }

    async fn clear_cookies(&self) {
        self.cookie_clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn preflight(&self, _base_url: &str) -> Result<(), PortalError> {
        Ok(())
    }
}

pub(crate) struct Offline;

#[async_trait]
impl Connectivity for Offline {
    async fn preflight(&self, _base_url: &str) -> Result<(), PortalError> {
        Err(PortalError::NetworkUnavailable)
    }
}

pub(crate) fn json(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body).with_header("Content-Type", "application/json")
}

pub(crate) fn html(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body).with_header("Content-Type", "text/html;charset=UTF-8")
}

pub(crate) const LOGIN_PAGE: &str = r#"<html><head><title>系統登入</title></head>
<body><form action="/wise/wiseadm/s/login" method="post">
<input name="loginName"/><input type="password" name="intumitPswd"/></form></body></html>"#;
