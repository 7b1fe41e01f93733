//! Router-level integration tests against the axum app, using
//! `tower::util::ServiceExt::oneshot` so no socket is bound. The
//! SandboxRouter (`/execute`, `/interrupt`, `/answer`, `/claim`) is mocked
//! with `wiremock`; `SIDECAR_MOCK_URL` tells `sandbox-runtime` to treat every
//! created sandbox as backed by that mock server.
//!
//! Covers SPEC_FULL's end-to-end scenarios 1, 2, 5, 6 and testable
//! properties P2, P8, P9.

use http_body_util::BodyExt;
use hyper::Request;
use serde_json::{Value, json};
use serial_test::serial;
use stream_broker::build_router;
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unique_thread_id() -> String {
    format!("t{}", sandbox_runtime::util::now_ts())
}

async fn mock_router() -> MockServer {
    let server = MockServer::start().await;
    let port: u16 = server.address().port();
    unsafe { std::env::set_var("SIDECAR_MOCK_URL", format!("http://localhost:{port}")) };
    unsafe { std::env::set_var("ROUTER_LOCAL_PORT", port.to_string()) };
    server
}

async fn post(router: &axum::Router, uri: &str, body: Value) -> (hyper::StatusCode, Value, hyper::HeaderMap) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let collected = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&collected).to_string();
    let value: Value = serde_json::from_str(&text).unwrap_or(json!(text));
    (status, value, headers)
}

async fn post_sse(router: &axum::Router, uri: &str, body: Value) -> (hyper::StatusCode, String, hyper::HeaderMap) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let collected = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&collected).to_string();
    (status, text, headers)
}

#[tokio::test]
#[serial]
async fn cold_start_creates_sandbox_and_streams_result() {
    let server = mock_router().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/claim")).respond_with(ResponseTemplate::new(200).set_body_json(json!({}))).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "data: {\"type\":\"result\",\"data\":{\"text\":\"hi\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"ignored\"}\n\n",
                "text/event-stream",
            ),
        )
        .mount(&server)
        .await;

    let router = build_router();
    let (status, body, headers) = post_sse(&router, "/investigate", json!({ "prompt": "hi" })).await;

    assert_eq!(status, hyper::StatusCode::OK);
    assert!(headers.get("x-thread-id").is_some(), "scenario 1: must return X-Thread-ID header");
    assert!(body.contains("\"success\":true"));
}

#[tokio::test]
#[serial]
async fn followup_reuses_existing_sandbox() {
    let server = mock_router().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/claim")).respond_with(ResponseTemplate::new(200).set_body_json(json!({}))).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"result\",\"data\":{\"text\":\"hi\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"ignored\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let router = build_router();
    let thread_id = unique_thread_id();

    let (status1, _, _) = post_sse(&router, "/investigate", json!({ "prompt": "hi", "thread_id": thread_id })).await;
    assert_eq!(status1, hyper::StatusCode::OK);
    assert!(sandbox_runtime::runtime::get_sandbox(&thread_id).is_some());

    let (status2, _, _) = post_sse(&router, "/investigate", json!({ "prompt": "again", "thread_id": thread_id })).await;
    assert_eq!(status2, hyper::StatusCode::OK, "P2: reusing a thread_id must not fail with AlreadyExists");
}

#[tokio::test]
#[serial]
async fn interrupt_on_missing_thread_is_404_with_detail() {
    let _server = mock_router().await;
    let router = build_router();
    let (status, body, _) = post(&router, "/interrupt", json!({ "thread_id": "ghost-thread-xyz" })).await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("No active sandbox"));
}

#[tokio::test]
#[serial]
async fn answer_after_timeout_maps_to_400() {
    let server = mock_router().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/claim")).respond_with(ResponseTemplate::new(200).set_body_json(json!({}))).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"question_timeout\",\"data\":{},\"thread_id\":\"ignored\"}\n\ndata: {\"type\":\"result\",\"data\":{\"text\":\"\",\"success\":false,\"subtype\":\"timeout\"},\"thread_id\":\"ignored\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/answer"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "No pending question (timed out)" })))
        .mount(&server)
        .await;

    let router = build_router();
    let thread_id = unique_thread_id();
    let (_, _, _) = post_sse(&router, "/investigate", json!({ "prompt": "hi", "thread_id": thread_id })).await;

    let (status, body, _) = post(&router, "/answer", json!({ "thread_id": thread_id, "answers": {"q1": "42"} })).await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().to_lowercase().contains("timed out") || body["detail"].as_str().unwrap().contains("pending"));
}

#[tokio::test]
#[serial]
async fn broken_stream_synthesizes_orchestrator_error_event() {
    let server = mock_router().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/claim")).respond_with(ResponseTemplate::new(200).set_body_json(json!({}))).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"thought\",\"data\":{\"text\":\"thinking\"},\"thread_id\":\"ignored\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let router = build_router();
    let (status, body, _) = post_sse(&router, "/investigate", json!({ "prompt": "hi" })).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert!(body.contains("\"type\":\"error\""), "P9: non-terminal close must synthesize exactly one error event");
    assert!(body.contains("\"recoverable\":false"));
}

#[tokio::test]
async fn health_reports_active_tokens() {
    let router = build_router();
    let request = Request::builder().method("GET").uri("/health").body(axum::body::Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), hyper::StatusCode::OK);
    let collected = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&collected).unwrap();
    assert_eq!(value["status"], "ok");
    assert!(value["active_download_tokens"].is_number());
}

#[tokio::test]
async fn metrics_exposes_prometheus_text() {
    let router = build_router();
    let request = Request::builder().method("GET").uri("/metrics").body(axum::body::Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), hyper::StatusCode::OK);
    let collected = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&collected).to_string();
    assert!(text.contains("sandbox_investigations_total"));
}

#[tokio::test]
#[serial]
async fn file_attachment_flow_mints_and_redeems_token_without_leaking_auth() {
    let server = mock_router().await;
    let upstream = MockServer::start().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("POST")).and(path("/claim")).respond_with(ResponseTemplate::new(200).set_body_json(json!({}))).mount(&server).await;
    Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(b"csv,data".to_vec())).mount(&upstream).await;

    let captured_sent_payload = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
    let captured = captured_sent_payload.clone();
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(move |req: &wiremock::Request| {
            *captured.lock().unwrap() = String::from_utf8_lossy(&req.body).to_string();
            ResponseTemplate::new(200).set_body_raw(
                "data: {\"type\":\"result\",\"data\":{\"text\":\"done\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"ignored\"}\n\n",
                "text/event-stream",
            )
        })
        .mount(&server)
        .await;

    let router = build_router();
    let download_url = format!("{}/f", upstream.uri());
    let (status, _, _) = post_sse(
        &router,
        "/investigate",
        json!({
            "prompt": "look at this file",
            "file_attachments": [{
                "filename": "data.csv",
                "size": 1024,
                "media_type": "text/csv",
                "download_url": download_url,
                "auth_header": "Bearer SECRET",
            }],
        }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let sent = captured_sent_payload.lock().unwrap().clone();
    assert!(sent.contains("data.csv"));
    assert!(sent.contains("proxy_url"));
    assert!(!sent.contains("SECRET"), "P6: upstream_auth must never reach the sandbox payload");

    let sent_json: Value = serde_json::from_str(&sent).unwrap();
    let token = sent_json["file_downloads"][0]["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/proxy/files/{token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), hyper::StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"csv,data");

    let second_request = Request::builder()
        .method("GET")
        .uri(format!("/proxy/files/{token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let second_response = router.oneshot(second_request).await.unwrap();
    assert_eq!(second_response.status(), hyper::StatusCode::NOT_FOUND, "P5: a second redemption must 404");
}
