//! Log Redaction Layer
//!
//! Scrubs session cookies, form passwords, and bearer tokens from strings
//! prior to logging.

use once_cell::sync::Lazy;
use regex::Regex;

/// `Cookie:` / `Set-Cookie:` header lines.
static COOKIE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)((?:set-)?cookie\s*[:=]\s*)[^\r\n]+").unwrap());

/// Well-known session cookie pairs appearing anywhere in text.
static SESSION_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(JSESSIONID|SESSIONID|SESSION|PHPSESSID|remember-me)=[^;\s&]+").unwrap()
});

/// Password fields in url-encoded bodies or query strings.
static PASSWORD_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(intumitPswd|password|passwd|pswd)=[^&\s]*").unwrap());

static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = COOKIE_HEADER_RE.replace_all(input, "${1}[REDACTED_COOKIE]");
    let redacted = SESSION_PAIR_RE.replace_all(&redacted, "${1}=[REDACTED]");
    let redacted = PASSWORD_FIELD_RE.replace_all(&redacted, "${1}=[REDACTED]");
    BEARER_RE
        .replace_all(&redacted, "Bearer [REDACTED_TOKEN]")
        .into_owned()
}

/// Short, redacted preview of a response body for debug logs.
pub fn body_preview(body: &str, max_chars: usize) -> String {
    let clipped: String = body.chars().take(max_chars).collect();
    let clipped = clipped.split_whitespace().collect::<Vec<_>>().join(" ");
    if body.chars().count() > max_chars {
        format!("{}…", redact_sensitive_data(&clipped))
    } else {
        redact_sensitive_data(&clipped)
    }
}
