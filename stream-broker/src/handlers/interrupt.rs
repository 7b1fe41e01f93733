use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sandbox_runtime::runtime;

use crate::sse::passthrough_body;
use crate::types::InterruptRequest;
use crate::util::{detail_response, error_response};

/// `POST /interrupt`: requires an existing sandbox for `thread_id`; streams
/// the agent's `/interrupt` SSE response back unchanged.
pub async fn interrupt(Json(request): Json<InterruptRequest>) -> Response {
    let Some(info) = runtime::get_sandbox(&request.thread_id) else {
        return detail_response(
            StatusCode::NOT_FOUND,
            format!("No active sandbox for thread '{}'", request.thread_id),
        );
    };

    match runtime::interrupt_sandbox(&info).await {
        Ok(upstream) => {
            let body = passthrough_body(upstream, request.thread_id.clone());
            let mut response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .header("x-accel-buffering", "no")
                .body(body)
                .expect("static headers are always valid");
            if let Ok(value) = HeaderValue::from_str(&request.thread_id) {
                response.headers_mut().insert("x-thread-id", value);
            }
            response.into_response()
        }
        Err(err) => error_response(err),
    }
}
