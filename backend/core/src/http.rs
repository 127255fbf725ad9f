//! Transport-neutral HTTP request/response values.
//!
//! Discovery, authentication and dispatch speak only these types, so the
//! heuristics can be driven by a scripted transport in tests.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    /// Safe to resend after a connect failure.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Head => write!(f, "HEAD"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// An outgoing request. `form` is sent `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a `Cookie` header unless the value is empty.
    pub fn cookie(self, cookie: Option<&str>) -> Self {
        match cookie {
            Some(c) if !c.trim().is_empty() => self.header("Cookie", c),
            _ => self,
        }
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response with the body already read as text. Redirects are never
/// followed, so 3xx responses arrive here with their `Location` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Every value of a repeated header, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `name=value` of a `Set-Cookie` value, attributes dropped.
pub fn cookie_pair(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    if pair.contains('=') && !pair.starts_with('=') {
        Some(pair)
    } else {
        None
    }
}

/// Join a URL base and a path without doubling or dropping the slash.
/// Absolute URLs in `path` are returned unchanged.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = HttpResponse::new(302, "")
            .with_header("location", "/dashboard")
            .with_header("Set-Cookie", "A=1; Path=/")
            .with_header("set-cookie", "B=2; HttpOnly");
        assert_eq!(resp.header("Location"), Some("/dashboard"));
        assert_eq!(resp.header_values("Set-Cookie").count(), 2);
    }

    #[test]
    fn cookie_pair_drops_attributes() {
        assert_eq!(cookie_pair("JSESSIONID=abc; Path=/; HttpOnly"), Some("JSESSIONID=abc"));
        assert_eq!(cookie_pair("garbage"), None);
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://h/", "/login"), "https://h/login");
        assert_eq!(join_url("https://h", "login"), "https://h/login");
        assert_eq!(join_url("https://h", "https://other/x"), "https://other/x");
    }

    #[test]
    fn empty_cookie_is_not_attached() {
        let req = HttpRequest::get("https://h/").cookie(Some("  "));
        assert!(req.header_value("Cookie").is_none());
        let req = HttpRequest::get("https://h/").cookie(Some("a=b"));
        assert_eq!(req.header_value("cookie"), Some("a=b"));
    }
}
