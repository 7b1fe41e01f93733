use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqwest::StatusCode as UpstreamStatus;
use sandbox_runtime::runtime;
use serde_json::Value;

use crate::types::{AnswerResponse, AnswerRequest};
use crate::util::{detail_response, error_response};

fn extract_detail(body: &Value) -> Option<String> {
    body.get("detail")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `POST /answer`: requires an existing sandbox; forwards synchronously and
/// remaps the upstream status per the spec's distinguished error cases.
pub async fn answer(Json(request): Json<AnswerRequest>) -> Response {
    let Some(info) = runtime::get_sandbox(&request.thread_id) else {
        return detail_response(
            StatusCode::NOT_FOUND,
            format!("No active sandbox for thread '{}'", request.thread_id),
        );
    };

    let (status, body) = match runtime::send_answer_to_sandbox(&info, &request.answers).await {
        Ok(result) => result,
        Err(err) => return error_response(err),
    };

    match status {
        s if s.is_success() => {
            Json(AnswerResponse { status: "ok".to_string(), thread_id: request.thread_id }).into_response()
        }
        UpstreamStatus::BAD_REQUEST => detail_response(
            StatusCode::BAD_REQUEST,
            extract_detail(&body).unwrap_or_else(|| "No pending question".to_string()),
        ),
        UpstreamStatus::NOT_FOUND => detail_response(
            StatusCode::NOT_FOUND,
            extract_detail(&body).unwrap_or_else(|| "No active session".to_string()),
        ),
        _ => detail_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            extract_detail(&body).unwrap_or_else(|| "upstream answer call failed".to_string()),
        ),
    }
}
