//! Real sandbox integration test.
//!
//! Spins up an actual sandbox agent container via Docker and drives it
//! through the real `stream-broker` router — no `SIDECAR_MOCK_URL`, no
//! wiremock. Requires Docker and a local sandbox agent image.
//!
//! Run:
//!   REAL_SIDECAR=1 SANDBOX_IMAGE=<image> cargo test --test real_sidecar -- --test-threads=1
//!
//! Skipped entirely (assertion-free pass) unless `REAL_SIDECAR=1` is set, so
//! it never runs in CI environments without Docker.

use std::time::Duration;

use http_body_util::BodyExt;
use hyper::Request;
use serde_json::json;
use stream_broker::build_router;
use tower::util::ServiceExt;

fn should_run() -> bool {
    std::env::var("REAL_SIDECAR").as_deref() == Ok("1")
}

macro_rules! skip_unless_real {
    () => {
        if !should_run() {
            eprintln!("skipping: set REAL_SIDECAR=1 to run against a real sandbox container");
            return;
        }
    };
}

#[tokio::test]
async fn cold_start_against_real_sandbox_container() {
    skip_unless_real!();

    let router = build_router();
    let thread_id = format!("real-{}", sandbox_runtime::util::now_ts());

    let request = Request::builder()
        .method("POST")
        .uri("/investigate")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({ "prompt": "say hello", "thread_id": thread_id }).to_string(),
        ))
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(150), router.oneshot(request))
        .await
        .expect("investigate timed out against real sandbox")
        .unwrap();

    assert_eq!(response.status(), hyper::StatusCode::OK);
    let collected = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&collected).to_string();
    assert!(
        text.contains("\"type\":\"result\"") || text.contains("\"type\":\"error\""),
        "stream must terminate with a result or error event, got: {text}"
    );

    let _ = sandbox_runtime::runtime::delete_sandbox(&thread_id).await;
}
