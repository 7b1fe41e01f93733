use thiserror::Error;

/// Errors a trigger adapter's plumbing can surface. Distinct from
/// `sandbox_runtime::SandboxError` — adapters talk to `ConfigClient` and the
/// `StreamBroker` over HTTP, not to the sandbox runtime directly.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("config client request failed: {0}")]
    ConfigClientRequest(String),

    #[error("config client returned {status}: {body}")]
    ConfigClientError { status: u16, body: String },

    #[error("routing miss for identifier '{0}'")]
    RoutingMiss(String),

    #[error("admin token missing; impersonation requires SANDBOX_CONFIG_ADMIN_TOKEN")]
    AuthMissing,

    #[error("malformed sse event: {0}")]
    MalformedEvent(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
