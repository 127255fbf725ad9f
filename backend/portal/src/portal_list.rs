//! Structured portal list discovery through the backend's JSON list endpoint.

use std::sync::Arc;

use indexmap::IndexMap;
use portalchat_core::{
    join_url, HttpRequest, HttpTransport, PortalId, PortalListResult, PortalParameter,
    PortalSummary,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const LIST_QUERY: &str = "page=0&rows=20&sort=updatedTime&order=desc&term=";
const PUBLISHED: &str = "PUBLISH";

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    content: Vec<Option<ListEntry>>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(default)]
    mgm: Option<PortalRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    input_settings: Option<Vec<Option<InputSetting>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputSetting {
    #[serde(default, alias = "key")]
    name: Option<String>,
    #[serde(default, alias = "defaultValue")]
    value: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default, alias = "label")]
    description: Option<String>,
}

impl PortalRecord {
    fn into_summary(self) -> Option<PortalSummary> {
        let id = match &self.id {
            Some(Value::String(s)) if !s.trim().is_empty() => PortalId::new(s.trim()),
            Some(Value::Number(n)) => PortalId::new(n.to_string()),
            other => {
                debug!(id = ?other, "Skipping portal entry without a usable id");
                return None;
            }
        };

        let mut parameters = IndexMap::new();
        for setting in self.input_settings.into_iter().flatten().flatten() {
            let Some(name) = setting.name.filter(|n| !n.trim().is_empty()) else {
                continue;
            };
            let value = match setting.value {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let mut parameter = PortalParameter::text(value);
            if let Some(kind) = setting.kind.filter(|k| !k.is_empty()) {
                parameter.kind = kind;
            }
            parameter.required = setting.required.unwrap_or(false);
            parameter.description = setting.description.unwrap_or_default();
            parameters.insert(name, parameter);
        }

        Some(PortalSummary {
            id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            parameters,
        })
    }
}

/// Parse the list envelope and keep published portals.
pub fn parse_portal_list(body: &str) -> Result<Vec<PortalSummary>, serde_json::Error> {
    let envelope: ListEnvelope = serde_json::from_str(body)?;
    Ok(envelope
        .content
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.mgm)
        .filter_map(PortalRecord::into_summary)
        .filter(|p| p.status == PUBLISHED)
        .collect())
}

pub struct PortalListDiscovery {
    transport: Arc<dyn HttpTransport>,
}

impl PortalListDiscovery {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetch published portals. An empty list is a success; only HTTP and
    /// parse failures are reported as failures.
    pub async fn discover_portals(
        &self,
        base_url: &str,
        session_cookie: &str,
        portal_base_path: &str,
    ) -> PortalListResult {
        let url = format!(
            "{}/list?{LIST_QUERY}",
            join_url(base_url, portal_base_path).trim_end_matches('/')
        );
        let request = HttpRequest::get(&url)
            .header("Accept", "application/json")
            .cookie(Some(session_cookie));

        let response = match self.transport.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = %url, error = %e, "Portal list request failed");
                return PortalListResult {
                    portals: Vec::new(),
                    success: false,
                    message: e.to_string(),
                };
            }
        };

        if !response.is_success() {
            return PortalListResult {
                portals: Vec::new(),
                success: false,
                message: format!("Portal list returned HTTP {}", response.status),
            };
        }

        match parse_portal_list(&response.body) {
            Ok(portals) => {
                info!(count = portals.len(), "Portal list discovered");
                PortalListResult {
                    message: format!("Found {} published portal(s)", portals.len()),
                    portals,
                    success: true,
                }
            }
            Err(e) => {
                debug!(error = %e, "Portal list is not valid JSON");
                PortalListResult {
                    portals: Vec::new(),
                    success: false,
                    message: format!("Portal list could not be parsed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{html, json, ScriptedTransport, LOGIN_PAGE};
    use portalchat_core::Method;

    const BASE: &str = "https://portal.example.com";
    const PORTAL_BASE: &str = "/wise/wiseadm/s/promptportal/portal";

    const LIST_BODY: &str = r#"{
        "content": [
            {"mgm": {"id": 12, "name": "Contracts", "description": "Contract review",
                     "status": "PUBLISH",
                     "inputSettings": [
                        {"name": "QUESTION", "type": "textarea", "required": true, "description": "Your question"},
                        {"name": "LANG", "value": "en"}
                     ]}},
            {"mgm": {"id": "13", "name": "Draft", "status": "DRAFT"}},
            {"mgm": {"id": "7", "name": "HR", "description": null, "status": "PUBLISH"}},
            {"other": true}
        ],
        "totalElements": 3
    }"#;

    #[tokio::test]
    async fn keeps_only_published_portals() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/portal/list", json(200, LIST_BODY));

        let result = PortalListDiscovery::new(transport.clone())
            .discover_portals(BASE, "JSESSIONID=abc", PORTAL_BASE)
            .await;

        assert!(result.success);
        let ids: Vec<&str> = result.portals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["12", "7"]);

        let contracts = &result.portals[0];
        let keys: Vec<&String> = contracts.parameters.keys().collect();
        assert_eq!(keys, vec!["QUESTION", "LANG"]);
        assert_eq!(contracts.parameters["QUESTION"].kind, "textarea");
        assert!(contracts.parameters["QUESTION"].required);
        assert_eq!(contracts.parameters["LANG"].value, "en");

        let call = &transport.calls()[0];
        assert_eq!(
            call.url,
            format!("{BASE}{PORTAL_BASE}/list?page=0&rows=20&sort=updatedTime&order=desc&term=")
        );
        assert_eq!(call.header_value("Cookie"), Some("JSESSIONID=abc"));
    }

    #[test]
    fn untidy_entries_do_not_sink_the_listing() {
        let body = r#"{"content":[
            {"mgm":{"id":1,"name":"Nulls","status":"PUBLISH","inputSettings":null}},
            {"mgm":{"id":2,"name":"Good","status":"PUBLISH",
                    "inputSettings":[{"name":"Q","required":null},null]}},
            {"mgm":{"name":"No id","status":"PUBLISH"}},
            {"mgm":{"id":null,"status":"PUBLISH"}},
            null
        ]}"#;
        let portals = parse_portal_list(body).unwrap();
        let ids: Vec<&str> = portals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(portals[0].parameters.is_empty());
        assert!(!portals[1].parameters["Q"].required);
    }

    #[tokio::test]
    async fn empty_published_list_is_still_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/portal/list", json(200, r#"{"content": []}"#));

        let result = PortalListDiscovery::new(transport)
            .discover_portals(BASE, "c=1", PORTAL_BASE)
            .await;
        assert!(result.success);
        assert!(result.portals.is_empty());
    }

    #[tokio::test]
    async fn login_page_is_a_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/portal/list", html(200, LOGIN_PAGE));

        let result = PortalListDiscovery::new(transport)
            .discover_portals(BASE, "c=1", PORTAL_BASE)
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn non_2xx_is_a_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/portal/list", json(500, "{}"));

        let result = PortalListDiscovery::new(transport)
            .discover_portals(BASE, "c=1", PORTAL_BASE)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("500"));
    }

    #[test]
    fn summary_converts_to_portal_config() {
        let portals = parse_portal_list(LIST_BODY).unwrap();
        let config = portals[0].to_portal_config();
        assert_eq!(config.id, PortalId::from("12"));
        assert_eq!(config.parameters.len(), 2);
    }
}
