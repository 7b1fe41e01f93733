//! Byte-for-byte SSE passthrough from the SandboxRouter to the public HTTP
//! client.
//!
//! Deliberately not axum's typed `Sse<Event>` wrapper: the spec requires the
//! upstream payload to be forwarded unparsed and unmutated (P8), and the
//! typed wrapper would re-serialize every event. Instead this reads the
//! upstream response as raw bytes, splits on `\n` only to detect line
//! boundaries and passively peek at `data:` lines for the terminal-event
//! bookkeeping, and re-emits every line unchanged.
//!
//! Line boundaries are found on the raw byte buffer, not on a
//! per-chunk-decoded `String`: `reqwest`'s `bytes_stream()` splits at
//! arbitrary byte offsets, so a multibyte UTF-8 codepoint can straddle two
//! chunks. A multibyte UTF-8 sequence never contains the byte `\n` (0x0A) —
//! continuation bytes are always `0x80..=0xBF` — so splitting on `\n` in the
//! byte buffer always lands on a boundary where the bytes accumulated so far
//! form a complete, valid UTF-8 line, regardless of where chunk boundaries
//! fell. Only a full line is ever decoded to `str`.

use axum::body::{Body, Bytes};
use futures_util::StreamExt;
use sandbox_runtime::events::{StreamEventEnvelope, peek_is_terminal_data_line};
use sandbox_runtime::metrics;

/// Turn an upstream streaming `reqwest::Response` into an axum response body
/// that forwards every line unchanged, appending an orchestrator-side
/// `error{recoverable=false}` event if the upstream closes without having
/// forwarded a terminal (`result`/`error`) event.
pub fn passthrough_body(upstream: reqwest::Response, thread_id: String) -> Body {
    let mut byte_stream = upstream.bytes_stream();

    let stream = async_stream::stream! {
        let mut buf: Vec<u8> = Vec::new();
        let mut saw_terminal = false;

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(thread_id = %thread_id, error = %err, "sse passthrough: upstream read failed");
                    break;
                }
            };
            buf.extend_from_slice(&chunk);

            while let Some(idx) = buf.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buf.drain(..=idx).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                let line = line.trim_end_matches('\n');
                if line.is_empty() {
                    continue;
                }
                if peek_is_terminal_data_line(line) {
                    saw_terminal = true;
                }
                let mut out = format!("{line}\n");
                if line.starts_with("data:") {
                    out.push('\n');
                }
                yield Ok::<Bytes, std::io::Error>(Bytes::from(out));
            }
        }

        let remainder = String::from_utf8_lossy(&buf);
        let remainder = remainder.trim();
        if !remainder.is_empty() {
            let line = remainder.to_string();
            if peek_is_terminal_data_line(&line) {
                saw_terminal = true;
            }
            let mut out = format!("{line}\n");
            if line.starts_with("data:") {
                out.push('\n');
            }
            yield Ok::<Bytes, std::io::Error>(Bytes::from(out));
        }

        if saw_terminal {
            metrics::metrics().sse_streams_clean_close_total.inc();
        } else {
            metrics::metrics().sse_streams_broken_total.inc();
            let envelope = StreamEventEnvelope::new(
                sandbox_runtime::events::StreamEvent::upstream_broken("upstream stream ended before a terminal event"),
                thread_id.clone(),
            );
            yield Ok::<Bytes, std::io::Error>(Bytes::from(envelope.to_sse_frame()));
        }
    };

    Body::from_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn drain(body: Body) -> String {
        let collected = body.collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&collected).to_string()
    }

    async fn mock_sse_response(body: &'static str) -> reqwest::Response {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        // Leak the server so its listener outlives this function; acceptable
        // in a short-lived test process.
        let url = format!("{}/stream", server.uri());
        std::mem::forget(server);
        reqwest::get(url).await.unwrap()
    }

    #[tokio::test]
    async fn forwards_clean_close_without_synthesizing_error() {
        let body = "data: {\"type\":\"thought\",\"data\":{\"text\":\"hi\"},\"thread_id\":\"t1\"}\n\ndata: {\"type\":\"result\",\"data\":{\"text\":\"done\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"t1\"}\n\n";
        let response = mock_sse_response(body).await;
        let out = drain(passthrough_body(response, "t1".into())).await;
        assert!(out.contains("\"type\":\"result\""));
        assert!(!out.contains("upstream stream ended"));
    }

    #[tokio::test]
    async fn forwards_multibyte_payload_intact() {
        let body = "data: {\"type\":\"thought\",\"data\":{\"text\":\"caf\u{e9} \u{1f980}\"},\"thread_id\":\"t1\"}\n\ndata: {\"type\":\"result\",\"data\":{\"text\":\"done\",\"success\":true,\"subtype\":\"final\"},\"thread_id\":\"t1\"}\n\n";
        let response = mock_sse_response(body).await;
        let out = drain(passthrough_body(response, "t1".into())).await;
        assert!(out.contains("caf\u{e9} \u{1f980}"));
        assert!(!out.contains('\u{fffd}'));
    }

    #[tokio::test]
    async fn synthesizes_error_on_broken_stream() {
        let body = "data: {\"type\":\"thought\",\"data\":{\"text\":\"hi\"},\"thread_id\":\"t1\"}\n\n";
        let response = mock_sse_response(body).await;
        let out = drain(passthrough_body(response, "t1".into())).await;
        assert!(out.contains("upstream stream ended"));
        assert!(out.contains("\"recoverable\":false"));
    }
}
