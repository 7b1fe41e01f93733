use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sandbox_runtime::runtime::{self, CreateSandboxParams};
use sandbox_runtime::{OrchestratorConfig, SandboxError, fileproxy, metrics, vault};
use serde_json::Value;
use std::collections::HashMap;

use crate::sse::passthrough_body;
use crate::types::InvestigateRequest;
use crate::util::{error_response, random_thread_id};

/// `POST /investigate`: resolve-or-create the thread's sandbox, mint download
/// tokens for any attachments, then stream the agent's SSE response back
/// unchanged.
pub async fn investigate(Json(request): Json<InvestigateRequest>) -> Response {
    let config = OrchestratorConfig::load();
    let thread_id = request.thread_id.clone().unwrap_or_else(random_thread_id);
    let tenant_id = request.tenant_id.clone().unwrap_or_else(|| config.default_tenant_id.clone());
    let team_id = request.team_id.clone().unwrap_or_else(|| config.default_team_id.clone());

    let existing = runtime::get_sandbox(&thread_id);
    let sandbox_info = match existing {
        Some(info) => {
            metrics::metrics().sandboxes_reused_total.inc();
            info
        }
        None => match provision_sandbox(&thread_id, &tenant_id, &team_id, request.team_token.as_deref()).await {
            Ok(info) => info,
            Err(err) => {
                metrics::metrics().investigations_failed_total.inc();
                return error_response(err);
            }
        },
    };

    let file_downloads = mint_attachment_tokens(&request);
    let images = request
        .images
        .as_ref()
        .map(|images| serde_json::to_value(images).unwrap_or(Value::Null));

    let upstream = runtime::execute_in_sandbox(&sandbox_info, &request.prompt, images, file_downloads).await;
    let upstream = match upstream {
        Ok(response) => response,
        Err(err) => {
            metrics::metrics().investigations_failed_total.inc();
            return error_response(err);
        }
    };

    metrics::metrics().investigations_total.inc();
    build_stream_response(upstream, thread_id)
}

async fn provision_sandbox(
    thread_id: &str,
    tenant_id: &str,
    team_id: &str,
    team_token: Option<&str>,
) -> sandbox_runtime::error::Result<sandbox_runtime::SandboxInfo> {
    let config = OrchestratorConfig::load();
    let session = vault::get_or_create(thread_id, tenant_id, team_id)?;

    let params = CreateSandboxParams {
        thread_id: thread_id.to_string(),
        tenant_id: tenant_id.to_string(),
        team_id: team_id.to_string(),
        jwt_token: session.jwt.clone(),
        team_token: team_token.map(str::to_string),
        extra_env: HashMap::new(),
    };

    let info = match runtime::create_sandbox(&params).await {
        Ok(info) => info,
        Err(SandboxError::AlreadyExists(_)) => runtime::get_sandbox(thread_id)
            .ok_or_else(|| SandboxError::SandboxSetupFailed("sandbox vanished after AlreadyExists race".into()))?,
        Err(err) => return Err(err),
    };

    let ready = runtime::wait_for_ready(thread_id, config.sandbox_ready_timeout).await;
    if !ready {
        return Err(SandboxError::Timeout(format!(
            "sandbox for thread '{thread_id}' did not become ready within {:?}",
            config.sandbox_ready_timeout
        )));
    }

    runtime::claim_sandbox(thread_id, &session.jwt, team_token).await?;
    runtime::get_sandbox(thread_id).ok_or_else(|| SandboxError::NotFound(thread_id.to_string()))
}

fn mint_attachment_tokens(request: &InvestigateRequest) -> Option<Value> {
    let attachments = request.file_attachments.as_ref()?;
    let entries: Vec<Value> = attachments
        .iter()
        .map(|attachment| {
            let token_entry = fileproxy::mint(
                &attachment.download_url,
                &attachment.auth_header,
                &attachment.filename,
                attachment.size,
                &attachment.media_type,
            );
            serde_json::json!({
                "token": token_entry.token,
                "filename": token_entry.filename,
                "size": token_entry.size,
                "media_type": token_entry.media_type,
                "proxy_url": fileproxy::proxy_url_for(&token_entry.token),
            })
        })
        .collect();
    Some(Value::Array(entries))
}

fn build_stream_response(upstream: reqwest::Response, thread_id: String) -> Response {
    let body = passthrough_body(upstream, thread_id.clone());
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(body)
        .expect("static headers are always valid");
    if let Ok(value) = HeaderValue::from_str(&thread_id) {
        response.headers_mut().insert("x-thread-id", value);
    }
    response.into_response()
}
