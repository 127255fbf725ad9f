//! Response classification for completion POSTs.
//!
//! The backend has no error protocol: expired sessions come back as a 200
//! login page, denied portals as a 403 HTML page. Every string heuristic
//! lives here behind [`ResponseClassifier`].

use once_cell::sync::Lazy;
use portalchat_core::HttpResponse;
use regex::Regex;
use serde_json::Value;

use portalchat_logging::body_preview;

const PREVIEW_CHARS: usize = 200;

/// Login words that show up in the `<title>` of the backend's login page.
const LOGIN_TITLE_MARKERS: &[&str] = &["登入", "登录", "login", "sign in"];

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static LOGIN_ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<form[^>]*action\s*=\s*["'][^"']*login[^"']*["']"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// `structured` is false when the reply text is a raw non-JSON body.
    Success { message: String, structured: bool },
    LoginRequired,
    AccessDenied,
    HttpError { status: u16 },
    Malformed { preview: String },
}

impl Classification {
    /// Short label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success { structured: true, .. } => "success",
            Classification::Success { structured: false, .. } => "success_plaintext",
            Classification::LoginRequired => "login_required",
            Classification::AccessDenied => "access_denied",
            Classification::HttpError { .. } => "http_error",
            Classification::Malformed { .. } => "malformed",
        }
    }
}

pub trait ResponseClassifier: Send + Sync {
    fn classify(&self, response: &HttpResponse) -> Classification;
}

/// Substring and JSON heuristics matching the backend's observed behaviour.
///
/// With `lenient_plaintext` set, a 2xx body that is neither JSON nor HTML is
/// returned as the reply text. Proxies that answer 200 with a plain-text
/// error page are then shown to the user as a chat reply.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicClassifier {
    pub lenient_plaintext: bool,
}

impl HeuristicClassifier {
    pub fn new(lenient_plaintext: bool) -> Self {
        Self { lenient_plaintext }
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResponseClassifier for HeuristicClassifier {
    fn classify(&self, response: &HttpResponse) -> Classification {
        let body = response.body.as_str();

        if has_login_title(body) || LOGIN_ACTION_RE.is_match(body) {
            return Classification::LoginRequired;
        }

        if response.status == 403 && is_access_denied_page(body) {
            return Classification::AccessDenied;
        }

        if !response.is_success() {
            return Classification::HttpError {
                status: response.status,
            };
        }

        match serde_json::from_str::<Value>(body) {
            Ok(json) => match json.get("completion").and_then(Value::as_str) {
                Some(text) if !text.trim().is_empty() => Classification::Success {
                    message: text.to_string(),
                    structured: true,
                },
                _ => Classification::LoginRequired,
            },
            Err(_) if looks_like_html(body) => Classification::LoginRequired,
            Err(_) if body.trim().is_empty() => Classification::Malformed {
                preview: String::new(),
            },
            Err(_) if self.lenient_plaintext => Classification::Success {
                message: body.trim().to_string(),
                structured: false,
            },
            Err(_) => Classification::Malformed {
                preview: body_preview(body, PREVIEW_CHARS),
            },
        }
    }
}

/// The page `<title>` contains a login word.
pub fn has_login_title(body: &str) -> bool {
    TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|title| {
            let title = title.as_str().to_lowercase();
            LOGIN_TITLE_MARKERS.iter().any(|m| title.contains(m))
        })
        .unwrap_or(false)
}

/// The backend's denied-portal page carries both phrases.
pub fn is_access_denied_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("forbidden") && lower.contains("not authorized")
}

pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().to_lowercase();
    head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || head.contains("<head")
        || head.contains("<body")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(status: u16, body: &str) -> Classification {
        HeuristicClassifier::default().classify(&HttpResponse::new(status, body))
    }

    #[test]
    fn completion_json_is_success() {
        assert_eq!(
            classify(200, r#"{"completion":"hello"}"#),
            Classification::Success {
                message: "hello".into(),
                structured: true
            }
        );
    }

    #[test]
    fn login_title_means_login_required() {
        let body = "<html><head><title>Portal 登入</title></head><body></body></html>";
        assert_eq!(classify(200, body), Classification::LoginRequired);
        assert_eq!(
            classify(200, "<html><title>Please Sign In</title></html>"),
            Classification::LoginRequired
        );
    }

    // Known limit: markers are matched on the raw body before any JSON
    // parse, so a completion that quotes a login page title is misread.
    #[test]
    fn completion_quoting_a_login_title_reads_as_login_page() {
        let body = r#"{"completion":"Use <title>Login</title> in the page head."}"#;
        assert_eq!(classify(200, body), Classification::LoginRequired);
    }

    #[test]
    fn login_form_action_means_login_required() {
        let body = r#"<div><form method="post" action="/wise/wiseadm/s/login"></form></div>"#;
        assert_eq!(classify(200, body), Classification::LoginRequired);
    }

    #[test]
    fn forbidden_page_is_access_denied() {
        let body = "<html><body><h1>403 - Forbidden</h1>You are not authorized to view this portal.</body></html>";
        assert_eq!(classify(403, body), Classification::AccessDenied);
    }

    #[test]
    fn bare_403_is_an_http_error() {
        assert_eq!(classify(403, "nope"), Classification::HttpError { status: 403 });
    }

    #[test]
    fn json_without_completion_means_login_required() {
        assert_eq!(classify(200, r#"{"status":"ok"}"#), Classification::LoginRequired);
        assert_eq!(classify(200, r#"{"completion":""}"#), Classification::LoginRequired);
    }

    #[test]
    fn unparseable_html_means_login_required() {
        assert_eq!(
            classify(200, "<!DOCTYPE html><html><body>redirecting</body></html>"),
            Classification::LoginRequired
        );
    }

    #[test]
    fn server_errors_keep_their_status() {
        assert_eq!(classify(502, "bad gateway"), Classification::HttpError { status: 502 });
    }

    // Known risk: in lenient mode a plain-text 2xx body is surfaced as a
    // successful reply even when it is a proxy or gateway error message.
    #[test]
    fn lenient_mode_accepts_plaintext_as_reply() {
        assert_eq!(
            classify(200, "Service temporarily unavailable"),
            Classification::Success {
                message: "Service temporarily unavailable".into(),
                structured: false
            }
        );
    }

    #[test]
    fn strict_mode_rejects_plaintext() {
        let strict = HeuristicClassifier::new(false);
        let result = strict.classify(&HttpResponse::new(200, "Service temporarily unavailable"));
        assert!(matches!(result, Classification::Malformed { .. }));
    }

    #[test]
    fn empty_body_is_always_malformed() {
        assert!(matches!(classify(200, "  "), Classification::Malformed { .. }));
    }
}
