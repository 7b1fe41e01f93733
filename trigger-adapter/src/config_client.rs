//! Thin HTTP client for the external config service, implementing the
//! operations of the spec's §6.3 `ConfigClient` against a JSON API.
//!
//! Deliberately thin: no retries, no caching beyond what `TokenVault`/session
//! state already provide in `sandbox-runtime`, every non-2xx response is a
//! typed [`AdapterError`]. Shaped after the teacher's `http.rs`
//! (`build_url`/`auth_headers`/`send_json`) but against this plane's own
//! wire contract instead of the sidecar's.

use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::Identifiers;
use crate::error::{AdapterError, Result};

#[derive(Debug, Clone, Serialize)]
struct LookupRoutingRequest<'a> {
    service_name: &'a str,
    thread_id: &'a str,
    user_id: &'a str,
    tenant_hint: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingResult {
    pub found: bool,
    pub tenant_id: Option<String>,
    pub team_id: Option<String>,
    pub matched_by: Option<String>,
    pub tried: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImpersonationToken {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectiveConfig {
    pub entrance_agent: String,
    #[serde(default)]
    pub agent: Value,
    #[serde(default)]
    pub integrations: Value,
    #[serde(default)]
    pub routing: Value,
}

/// A handle to the external config service. `base_url` and `admin_token`
/// are read once at construction from `CONFIG_SERVICE_URL` /
/// `SANDBOX_CONFIG_ADMIN_TOKEN`.
pub struct ConfigClient {
    base_url: Url,
    admin_token: Option<String>,
    client: Client,
}

impl ConfigClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CONFIG_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let base_url = Url::parse(&base_url)
            .map_err(|err| AdapterError::ConfigClientRequest(format!("invalid CONFIG_SERVICE_URL: {err}")))?;
        let admin_token = std::env::var("SANDBOX_CONFIG_ADMIN_TOKEN").ok().filter(|v| !v.trim().is_empty());
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))?;
        Ok(Self { base_url, admin_token, client })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| AdapterError::ConfigClientRequest(format!("invalid path '{path}': {err}")))
    }

    async fn send_json(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<Value> {
        let url = self.url(path)?;
        let mut request = self.client.request(method, url).header("content-type", "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AdapterError::ConfigClientError { status: status.as_u16(), body: text });
        }
        serde_json::from_str(&text)
            .map_err(|err| AdapterError::ConfigClientRequest(format!("invalid response JSON: {err}")))
    }

    /// `lookup_routing(service_name, identifiers, tenant_hint?) → routing`.
    pub async fn lookup_routing(
        &self,
        service_name: &str,
        identifiers: &Identifiers,
        tenant_hint: Option<&str>,
    ) -> Result<RoutingResult> {
        let body = serde_json::to_value(LookupRoutingRequest {
            service_name,
            thread_id: &identifiers.thread_id,
            user_id: &identifiers.user_id,
            tenant_hint,
        })
        .expect("LookupRoutingRequest always serializes");
        let value = self.send_json(Method::POST, "/routing/lookup", self.admin_token.as_deref(), Some(body)).await?;
        serde_json::from_value(value).map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))
    }

    /// `issue_team_impersonation_token(admin_token, tenant_id, team_id) → {token}`.
    pub async fn issue_team_impersonation_token(&self, tenant_id: &str, team_id: &str) -> Result<String> {
        let Some(admin_token) = self.admin_token.as_deref() else {
            return Err(AdapterError::AuthMissing);
        };
        let body = serde_json::json!({ "tenant_id": tenant_id, "team_id": team_id });
        let value = self.send_json(Method::POST, "/teams/impersonate", Some(admin_token), Some(body)).await?;
        let parsed: ImpersonationToken =
            serde_json::from_value(value).map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))?;
        Ok(parsed.token)
    }

    /// `get_effective_config(team_token) → {entrance_agent, agent.*, integrations.*, routing.*}`.
    pub async fn get_effective_config(&self, team_token: &str) -> Result<EffectiveConfig> {
        let value = self.send_json(Method::GET, "/config/effective", Some(team_token), None).await?;
        serde_json::from_value(value).map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))
    }

    /// Administrative creation of a tenant + default team + identifier
    /// registration, used only by auto-provisioning adapters. Atomic from
    /// the caller's view: any failure mid-way is reported as a single error,
    /// with no partial state assumed usable.
    pub async fn auto_provision(&self, service_name: &str, identifiers: &Identifiers) -> Result<RoutingResult> {
        let Some(admin_token) = self.admin_token.as_deref() else {
            return Err(AdapterError::AuthMissing);
        };
        let body = serde_json::json!({
            "service_name": service_name,
            "thread_id": identifiers.thread_id,
            "user_id": identifiers.user_id,
        });
        let value = self.send_json(Method::POST, "/admin/auto-provision", Some(admin_token), Some(body)).await?;
        serde_json::from_value(value).map_err(|err| AdapterError::ConfigClientRequest(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, admin_token: Option<&str>) -> ConfigClient {
        ConfigClient {
            base_url: Url::parse(&server.uri()).unwrap(),
            admin_token: admin_token.map(str::to_string),
            client: Client::new(),
        }
    }

    fn sample_identifiers() -> Identifiers {
        Identifiers {
            tenant_id: None,
            team_id: None,
            thread_id: "thread-a".into(),
            prompt_text: "hi".into(),
            user_id: "user-a".into(),
            attachments: vec![],
            conversation_ref: crate::adapter::ConversationRef { surface: "slack".into(), raw_id: "C1".into() },
        }
    }

    #[tokio::test]
    async fn lookup_routing_parses_found_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/routing/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true, "tenant_id": "tenant-a", "team_id": "team-a", "matched_by": "channel", "tried": ["channel"]
            })))
            .mount(&server)
            .await;
        let client = client_for(&server, Some("admin-token"));
        let result = client.lookup_routing("slack-bridge", &sample_identifiers(), None).await.unwrap();
        assert!(result.found);
        assert_eq!(result.tenant_id.as_deref(), Some("tenant-a"));
    }

    #[tokio::test]
    async fn impersonation_without_admin_token_is_auth_missing() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);
        let result = client.issue_team_impersonation_token("tenant-a", "team-a").await;
        assert!(matches!(result, Err(AdapterError::AuthMissing)));
    }

    #[tokio::test]
    async fn non_2xx_response_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/effective"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = client_for(&server, Some("admin-token"));
        let result = client.get_effective_config("team-token").await;
        assert!(matches!(result, Err(AdapterError::ConfigClientError { status: 503, .. })));
    }
}
