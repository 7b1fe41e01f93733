use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sandbox_runtime::SandboxError;

use crate::types::ErrorBody;

/// Short random `thread_id` for `/investigate` calls that omit one.
/// Hex output from `auth::generate_token` is already DNS-1123-safe.
pub fn random_thread_id() -> String {
    sandbox_runtime::auth::generate_token(8)
}

/// Render a `SandboxError` as the JSON error body the spec's scenarios use
/// literally (`{"detail": "..."}`), at the status its taxonomy maps to.
pub fn error_response(err: SandboxError) -> Response {
    let status = err.status_code();
    (status, Json(ErrorBody { detail: err.to_string() })).into_response()
}

pub fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorBody { detail: detail.into() })).into_response()
}
