//! Process-wide cookie jar keyed by origin.
//!
//! Plugged into reqwest as its `CookieStore`, so every request made through a
//! transport shares one jar. Cookies are keyed by (scheme, host, port);
//! `Domain`/`Path` scoping is not modelled since the backend is a single host.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OriginKey {
    scheme: String,
    host: String,
    port: u16,
}

impl OriginKey {
    fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default()?,
        })
    }
}

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

/// Cookie jar shared by all requests of a transport.
#[derive(Debug, Default)]
pub struct PortalCookieJar {
    cookies: RwLock<HashMap<OriginKey, Vec<StoredCookie>>>,
}

impl PortalCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raw `Set-Cookie` value received from `url`.
    pub fn store(&self, url: &Url, set_cookie: &str) {
        self.store_at(url, set_cookie, Utc::now());
    }

    fn store_at(&self, url: &Url, set_cookie: &str, now: DateTime<Utc>) {
        let Some(key) = OriginKey::from_url(url) else { return };
        let Some(cookie) = parse_set_cookie(set_cookie, now) else { return };

        let mut jar = self.cookies.write().unwrap_or_else(|e| e.into_inner());
        let entry = jar.entry(key).or_default();
        entry.retain(|c| c.name != cookie.name);
        if cookie.is_live(now) {
            debug!(name = %cookie.name, host = url.host_str().unwrap_or(""), "Stored cookie");
            entry.push(cookie);
        } else {
            debug!(name = %cookie.name, "Cookie expired on arrival; removed");
        }
    }

    /// `name=value; ...` for the origin of `url`, dropping expired entries.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        self.header_at(url, Utc::now())
    }

    fn header_at(&self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        let key = OriginKey::from_url(url)?;
        let mut jar = self.cookies.write().unwrap_or_else(|e| e.into_inner());
        let entry = jar.get_mut(&key)?;
        entry.retain(|c| c.is_live(now));
        if entry.is_empty() {
            return None;
        }
        Some(
            entry
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Forget every cookie (logout).
    pub fn clear(&self) {
        self.cookies.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl CookieStore for PortalCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(raw) = header.to_str() {
                self.store(url, raw);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|h| HeaderValue::from_str(&h).ok())
    }
}

/// Merge an explicit `Cookie` header with jar cookies; explicit values win.
pub fn merge_cookie_headers(explicit: Option<&str>, jar: Option<&str>) -> Option<String> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for source in [explicit, jar].into_iter().flatten() {
        for part in source.split(';') {
            let part = part.trim();
            let Some((name, value)) = part.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() || pairs.iter().any(|(n, _)| n == name) {
                continue;
            }
            pairs.push((name.to_string(), value.trim().to_string()));
        }
    }
    if pairs.is_empty() {
        None
    } else {
        Some(
            pairs
                .into_iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

fn parse_set_cookie(raw: &str, now: DateTime<Utc>) -> Option<StoredCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut max_age: Option<i64> = None;
    let mut expires: Option<DateTime<Utc>> = None;
    for attr in parts {
        let Some((key, val)) = attr.trim().split_once('=') else { continue };
        match key.trim().to_ascii_lowercase().as_str() {
            "max-age" => max_age = val.trim().parse().ok(),
            "expires" => expires = parse_expires(val.trim()),
            _ => {}
        }
    }

    // Max-Age takes precedence over Expires.
    let expires_at = match max_age {
        Some(secs) if secs <= 0 => Some(now - Duration::seconds(1)),
        Some(secs) => Some(now + Duration::seconds(secs)),
        None => expires,
    };

    Some(StoredCookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        expires_at,
    })
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
