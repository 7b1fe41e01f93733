//! SandboxRouter client: the orchestrator's view of the
//! internal gateway that resolves a sandbox-identity header triple to an
//! actual pod/container endpoint and forwards the request.
//!
//! Every outbound request here carries `X-Sandbox-ID`, `X-Sandbox-Port`,
//! `X-Sandbox-Namespace` so the gateway can route it without the orchestrator
//! doing per-sandbox DNS itself — this is what lets a sandbox survive
//! rescheduling without the caller's code changing.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::config::OrchestratorConfig;
use crate::error::{Result, SandboxError};
use crate::runtime::SandboxInfo;
use crate::util::http_client;

/// Resolve the SandboxRouter's base URL.
///
/// An explicit local-port override for development takes precedence over
/// the production in-namespace service DNS name, mirroring the original
/// implementation's `SandboxManager.get_router_url()`.
pub fn router_base_url() -> String {
    let config = OrchestratorConfig::load();
    match config.router_local_port {
        Some(port) => format!("http://localhost:{port}"),
        None => format!(
            "http://{}.{}.svc.cluster.local",
            config.router_service_name, config.router_namespace
        ),
    }
}

fn identity_headers(info: &SandboxInfo) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-sandbox-id"),
        HeaderValue::from_str(&info.name)
            .map_err(|err| SandboxError::BadRequest(format!("invalid sandbox name: {err}")))?,
    );
    headers.insert(
        HeaderName::from_static("x-sandbox-port"),
        HeaderValue::from_str(&info.sandbox_port.to_string()).expect("u16 is valid header value"),
    );
    headers.insert(
        HeaderName::from_static("x-sandbox-namespace"),
        HeaderValue::from_str(&info.namespace)
            .map_err(|err| SandboxError::BadRequest(format!("invalid namespace: {err}")))?,
    );
    Ok(headers)
}

async fn post_streamed(info: &SandboxInfo, path: &str, body: &Value) -> Result<Response> {
    let url = format!("{}{}", router_base_url(), path);
    let headers = identity_headers(info)?;
    let client = http_client()?;
    let response = client
        .post(&url)
        .headers(headers)
        .json(body)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        return Err(SandboxError::UpstreamGatewayError { status, message: text });
    }
    Ok(response)
}

async fn post_json(info: &SandboxInfo, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
    let url = format!("{}{}", router_base_url(), path);
    let headers = identity_headers(info)?;
    let client = http_client()?;
    let response = client
        .post(&url)
        .headers(headers)
        .json(body)
        .send()
        .await?;
    let status = response.status();
    let value: Value = response.json().await.unwrap_or(Value::Null);
    Ok((status, value))
}

/// `POST /execute`: streamed, must not be buffered before the
/// caller iterates it.
pub async fn execute(
    info: &SandboxInfo,
    thread_id: &str,
    prompt: &str,
    images: Option<Value>,
    file_downloads: Option<Value>,
) -> Result<Response> {
    let mut body = serde_json::json!({
        "prompt": prompt,
        "thread_id": thread_id,
    });
    if let Some(images) = images {
        body["images"] = images;
    }
    if let Some(file_downloads) = file_downloads {
        body["file_downloads"] = file_downloads;
    }
    post_streamed(info, "/execute", &body).await
}

/// `POST /interrupt`: streamed SSE passthrough unchanged.
pub async fn interrupt(info: &SandboxInfo, thread_id: &str) -> Result<Response> {
    let body = serde_json::json!({ "thread_id": thread_id });
    post_streamed(info, "/interrupt", &body).await
}

/// `POST /answer`: small synchronous JSON POST. Status/body are
/// returned verbatim so the caller (StreamBroker) can apply its own
/// error-mapping rules.
pub async fn answer(info: &SandboxInfo, thread_id: &str, answers: &Value) -> Result<(StatusCode, Value)> {
    let body = serde_json::json!({ "thread_id": thread_id, "answers": answers });
    post_json(info, "/answer", &body).await
}

/// `POST /claim`: injects the JWT into a fresh or warm sandbox before
/// its first `/execute`. Always called once per fresh sandbox in the
/// cold-start path, immediately after `wait_for_ready` succeeds.
pub async fn claim(info: &SandboxInfo, jwt: &str, team_token: Option<&str>) -> Result<()> {
    let mut body = serde_json::json!({ "thread_id": info.thread_id, "jwt": jwt });
    if let Some(team_token) = team_token {
        body["team_token"] = Value::String(team_token.to_string());
    }
    let (status, value) = post_json(info, "/claim", &body).await?;
    if !status.is_success() {
        return Err(SandboxError::UpstreamGatewayError {
            status: status.as_u16(),
            message: value.to_string(),
        });
    }
    Ok(())
}
