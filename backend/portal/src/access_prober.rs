//! Brute-force portal id prober, used when the structured list endpoint is
//! unavailable or empty.

use std::sync::Arc;

use once_cell::sync::Lazy;
use portalchat_core::{
    join_url, AccessLevel, HttpRequest, HttpTransport, PortalId, EMPTY_UPLOAD_MARKER,
};
use regex::Regex;
use tracing::{debug, info};

use crate::classifier::has_login_title;

static QUERY_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]id=(\d+)").unwrap());
static DATA_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-portal-id\s*=\s*["'](\d+)["']"#).unwrap());
static JS_ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"portalId\s*[:=]\s*["']?(\d+)"#).unwrap());

/// Tokens of the portal submit form.
const FORM_MARKERS: &[&str] = &["USERPROMPT", "USERUPLOADFILE", "<form", "<textarea"];

pub struct PortalAccessProber {
    transport: Arc<dyn HttpTransport>,
    portal_base_path: String,
    candidates: Vec<PortalId>,
    max_confirmed: usize,
}

impl PortalAccessProber {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        portal_base_path: impl Into<String>,
        candidates: Vec<PortalId>,
        max_confirmed: usize,
    ) -> Self {
        Self {
            transport,
            portal_base_path: portal_base_path.into(),
            candidates,
            max_confirmed: max_confirmed.max(1),
        }
    }

    /// Writable portal ids, at most `max_confirmed`. An empty list means the
    /// account has no submit permission anywhere we looked.
    pub async fn discover_available_portal_ids(
        &self,
        session_cookie: &str,
        base_url: &str,
    ) -> Vec<PortalId> {
        let main_url = join_url(base_url, &self.portal_base_path);
        let scraped = match self
            .transport
            .execute(HttpRequest::get(&main_url).cookie(Some(session_cookie)))
            .await
        {
            Ok(resp) if resp.is_success() => scrape_portal_ids(&resp.body),
            Ok(resp) => {
                debug!(status = resp.status, "Portal main page unavailable");
                Vec::new()
            }
            Err(e) => {
                debug!(error = %e, "Portal main page fetch failed");
                Vec::new()
            }
        };

        let from_page = !scraped.is_empty();
        let candidates = if from_page { scraped } else { self.candidates.clone() };

        let mut confirmed = Vec::new();
        for id in candidates {
            if self.test_portal_id_access(&id, session_cookie, base_url).await
                == AccessLevel::ReadWrite
            {
                confirmed.push(id);
                if confirmed.len() >= self.max_confirmed {
                    break;
                }
            }
        }

        info!(
            from_page,
            confirmed = ?confirmed.iter().map(PortalId::as_str).collect::<Vec<_>>(),
            "Portal id probe finished"
        );
        confirmed
    }

    pub async fn test_portal_id_access(
        &self,
        id: &PortalId,
        session_cookie: &str,
        base_url: &str,
    ) -> AccessLevel {
        let form_url = format!("{}?id={}", join_url(base_url, &self.portal_base_path), id);

        let page = match self
            .transport
            .execute(HttpRequest::get(&form_url).cookie(Some(session_cookie)))
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(portal_id = %id, error = %e, "Portal form fetch failed");
                return AccessLevel::Inaccessible;
            }
        };
        if !page.is_success() || page.status == 403 {
            return AccessLevel::Inaccessible;
        }
        if is_login_page(&page.body) {
            debug!(portal_id = %id, "Portal form page is a login page");
            return AccessLevel::Inaccessible;
        }
        if !FORM_MARKERS.iter().any(|m| page.body.contains(m)) {
            return AccessLevel::Inaccessible;
        }

        let probe = HttpRequest::post(&form_url)
            .cookie(Some(session_cookie))
            .form(vec![
                ("USERPROMPT".to_string(), "test".to_string()),
                ("USERUPLOADFILE".to_string(), EMPTY_UPLOAD_MARKER.to_string()),
            ]);
        let level = match self.transport.execute(probe).await {
            Ok(resp) => match resp.status {
                200 if !resp.body.trim().is_empty() && !is_forbidden_body(&resp.body) => {
                    AccessLevel::ReadWrite
                }
                // Parameter validation failed, so the write itself was permitted.
                400 => AccessLevel::ReadWrite,
                403 => AccessLevel::ReadOnly,
                _ => AccessLevel::Inaccessible,
            },
            Err(e) => {
                debug!(portal_id = %id, error = %e, "Portal probe POST failed");
                AccessLevel::Inaccessible
            }
        };
        debug!(portal_id = %id, ?level, "Portal access tested");
        level
    }
}

/// Numeric portal ids referenced by a page, in order, deduplicated.
pub fn scrape_portal_ids(html: &str) -> Vec<PortalId> {
    let mut ids: Vec<PortalId> = Vec::new();
    for re in [&*QUERY_ID_RE, &*DATA_ATTR_RE, &*JS_ASSIGN_RE] {
        for caps in re.captures_iter(html) {
            let id = PortalId::new(&caps[1]);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn is_login_page(body: &str) -> bool {
    has_login_title(body) || (body.contains("loginName") && body.contains("intumitPswd"))
}

fn is_forbidden_body(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("forbidden") || lower.contains("not authorized")
}
