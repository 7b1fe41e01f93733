use axum::body::{Body, Bytes};
use axum::extract::Path;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use once_cell::sync::OnceCell;
use reqwest::Client;
use sandbox_runtime::{OrchestratorConfig, SandboxError, fileproxy};

use crate::util::error_response;

static UPSTREAM_CLIENT: OnceCell<Client> = OnceCell::new();

/// Downstream chunks are never smaller than this except for the final one,
/// matching the upstream Python proxy's `aiter_bytes(chunk_size=65536)`.
const MIN_CHUNK_BYTES: usize = 64 * 1024;

/// Re-buffers an upstream byte stream so every emitted chunk (but the last)
/// is at least `MIN_CHUNK_BYTES`, regardless of how small or large the
/// chunks reqwest/hyper happen to deliver off the wire.
fn rechunk(
    mut upstream: impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin + Send + 'static,
) -> impl futures_util::Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
    async_stream::stream! {
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            buf.extend_from_slice(&chunk);
            if buf.len() >= MIN_CHUNK_BYTES {
                yield Ok(Bytes::from(std::mem::take(&mut buf)));
            }
        }

        if !buf.is_empty() {
            yield Ok(Bytes::from(buf));
        }
    }
}

/// HTTP client used only for upstream file downloads, with its own
/// connect+read budget distinct from the SandboxRouter client's timeout.
fn upstream_client() -> &'static Client {
    UPSTREAM_CLIENT.get_or_init(|| {
        let timeout = OrchestratorConfig::load().file_proxy_upstream_timeout;
        Client::builder()
            .timeout(timeout)
            .build()
            .expect("static TLS config is always valid")
    })
}

/// `GET /proxy/files/{token}`: single-use, credential-proof download proxy.
pub async fn proxy_file(Path(token): Path<String>) -> Response {
    let entry = match fileproxy::consume(&token) {
        Ok(entry) => entry,
        Err(err) => return error_response(err),
    };

    let mut request = upstream_client().get(&entry.upstream_url);
    if let Ok(value) = HeaderValue::from_str(&entry.upstream_auth) {
        request = request.header(header::AUTHORIZATION, value);
    }

    let upstream = match request.send().await {
        Ok(response) => response,
        Err(err) => return error_response(SandboxError::from(err)),
    };

    if !upstream.status().is_success() {
        let status = upstream.status().as_u16();
        let message = upstream.text().await.unwrap_or_default();
        return error_response(SandboxError::UpstreamGatewayError { status, message });
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, entry.media_type.clone())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", entry.filename),
        )
        .body(Body::from_stream(rechunk(upstream.bytes_stream())))
        .expect("static headers are always valid")
        .into_response()
}
