use axum::Json;
use axum::response::IntoResponse;
use sandbox_runtime::{fileproxy, reaper};

use crate::types::HealthResponse;

/// `GET /health`: GCs expired download tokens and reports how many remain
/// active. Not rate-limited.
pub async fn health() -> impl IntoResponse {
    reaper::gc_expired_tokens();
    Json(HealthResponse {
        status: "ok",
        active_download_tokens: fileproxy::active_count(),
    })
}
