use axum::response::IntoResponse;
use sandbox_runtime::metrics;

/// `GET /metrics`: Prometheus text exposition of the process-wide counters.
/// Not rate-limited, following the teacher's `operator_api.rs` handler.
pub async fn metrics() -> impl IntoResponse {
    let body = metrics::metrics().render_prometheus();
    (
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
