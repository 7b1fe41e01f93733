//! Request/response DTOs for the public HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileAttachmentRequest {
    pub filename: String,
    pub size: u64,
    pub media_type: String,
    pub download_url: String,
    pub auth_header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestigateRequest {
    pub prompt: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_token: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ImagePayload>>,
    #[serde(default)]
    pub file_attachments: Option<Vec<FileAttachmentRequest>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterruptRequest {
    pub thread_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub thread_id: String,
    pub answers: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub status: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_download_tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
