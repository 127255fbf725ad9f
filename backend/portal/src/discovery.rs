//! Endpoint discovery: infer the backend's login path, portal base path and
//! completion endpoint by scraping the landing page and probing known
//! layouts. Best-effort; every failure is a miss.

use std::sync::Arc;

use once_cell::sync::Lazy;
use portalchat_config::{BackendPaths, UUID_PLACEHOLDER};
use portalchat_core::{join_url, DiscoveredEndpoints, HttpRequest, HttpTransport};
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info};

static LOGIN_ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"action="([^"]*login[^"]*)""#).unwrap());

static PORTAL_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="([^"]*portal[^"]*)""#).unwrap());

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Discovered endpoints for one base URL. Storing a different base URL
/// replaces the entry.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    entry: RwLock<Option<(String, DiscoveredEndpoints)>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, base_url: &str) -> Option<DiscoveredEndpoints> {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some((cached_base, endpoints)) if same_base(cached_base, base_url) => {
                Some(endpoints.clone())
            }
            _ => None,
        }
    }

    pub async fn store(&self, base_url: &str, endpoints: DiscoveredEndpoints) {
        let mut entry = self.entry.write().await;
        if let Some((previous, _)) = entry.as_ref() {
            if !same_base(previous, base_url) {
                debug!(previous = %previous, base_url = %base_url, "Base URL changed; replacing discovery cache");
            }
        }
        *entry = Some((base_url.to_string(), endpoints));
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

fn same_base(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

pub struct EndpointDiscovery {
    transport: Arc<dyn HttpTransport>,
    paths: BackendPaths,
}

impl EndpointDiscovery {
    pub fn new(transport: Arc<dyn HttpTransport>, paths: BackendPaths) -> Self {
        Self { transport, paths }
    }

    pub async fn discover(&self, base_url: &str) -> DiscoveredEndpoints {
        let mut found = DiscoveredEndpoints::default();
        let mut portal_candidate = None;
        let mut uuid_sources = Vec::new();

        // Step 1: landing page.
        match self.transport.execute(HttpRequest::get(base_url)).await {
            Ok(resp) => {
                if let Some(location) = resp.header("Location") {
                    if location.to_lowercase().contains("login") {
                        found.login_path = Some(normalize_path(base_url, location));
                    }
                }
                if found.login_path.is_none() {
                    found.login_path = first_capture(&LOGIN_ACTION_RE, &resp.body)
                        .map(|p| normalize_path(base_url, &p));
                }
                portal_candidate = first_capture(&PORTAL_HREF_RE, &resp.body)
                    .map(|p| normalize_path(base_url, &p));
                uuid_sources.push(resp.body);
            }
            Err(e) => debug!(base_url = %base_url, error = %e, "Landing page fetch failed"),
        }

        // Step 2: tenant UUID layouts.
        if found.login_path.is_none() {
            for path in &self.paths.probe_paths {
                let url = join_url(base_url, path);
                if same_base(&url, base_url) && !uuid_sources.is_empty() {
                    continue;
                }
                match self.transport.execute(HttpRequest::get(&url)).await {
                    Ok(resp) => uuid_sources.push(resp.body),
                    Err(e) => debug!(url = %url, error = %e, "Probe page fetch failed"),
                }
            }

            'uuids: for uuid in extract_uuids(uuid_sources.iter().map(String::as_str)) {
                for template in self.paths.uuid_login_templates() {
                    let path = template.replace(UUID_PLACEHOLDER, &uuid);
                    if self.exists(base_url, &path).await {
                        found.login_path = Some(path);
                        found.detected_uuid = Some(uuid);
                        break 'uuids;
                    }
                }
            }
        }

        // Step 3: UUID-free layouts.
        if found.login_path.is_none() {
            for template in self.paths.plain_login_templates() {
                if self.exists(base_url, template).await {
                    found.login_path = Some(template.to_string());
                    break;
                }
            }
        }

        // Step 4: portal base.
        let candidates = portal_candidate
            .into_iter()
            .chain(self.paths.portal_base_templates.iter().cloned());
        for candidate in candidates {
            if self.exists(base_url, &candidate).await {
                found.portal_base_path = Some(candidate);
                break;
            }
        }

        found.completion_endpoint = found
            .portal_base_path
            .as_ref()
            .map(|base| format!("{}/completion", base.trim_end_matches('/')));
        found.discovery_success = found.login_path.is_some() || found.portal_base_path.is_some();

        info!(
            base_url = %base_url,
            login_path = ?found.login_path,
            portal_base_path = ?found.portal_base_path,
            detected_uuid = ?found.detected_uuid,
            success = found.discovery_success,
            "Endpoint discovery finished"
        );
        found
    }

    /// HEAD probe; 2xx or 302 means the path exists.
    async fn exists(&self, base_url: &str, path: &str) -> bool {
        let url = join_url(base_url, path);
        match self.transport.execute(HttpRequest::head(&url)).await {
            Ok(resp) => resp.is_success() || resp.status == 302,
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD probe failed");
                false
            }
        }
    }
}

fn first_capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

/// Strip the base URL, query and fragment; keep a leading slash.
fn normalize_path(base_url: &str, raw: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = raw.strip_prefix(base).unwrap_or(raw);
    let path = path.split(['?', '#', ';']).next().unwrap_or_default();
    if path.starts_with('/') || path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Valid UUIDs in order of first appearance, deduplicated.
pub fn extract_uuids<'a>(sources: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for source in sources {
        for m in UUID_RE.find_iter(source) {
            let candidate = m.as_str().to_lowercase();
            if uuid::Uuid::parse_str(&candidate).is_ok() && !seen.contains(&candidate) {
                seen.push(candidate);
            }
        }
    }
    seen
}
