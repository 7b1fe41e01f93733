use axum::http::StatusCode;
use thiserror::Error;

/// Errors returned by orchestration-plane operations.
///
/// Variant names follow the error taxonomy of the investigation orchestration
/// plane: each one maps to exactly one HTTP status at the StreamBroker/FileProxy
/// boundary via [`SandboxError::status_code`].
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("auth missing: {0}")]
    AuthMissing(String),

    #[error("routing miss: {0}")]
    RoutingMiss(String),

    #[error("sandbox already exists: {0}")]
    AlreadyExists(String),

    #[error("sandbox setup failed: {0}")]
    SandboxSetupFailed(String),

    #[error("upstream stream broken: {0}")]
    UpstreamStreamBroken(String),

    #[error("download token not found or expired: {0}")]
    TokenNotFound(String),

    #[error("upstream gateway error ({status}): {message}")]
    UpstreamGatewayError { status: u16, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("docker error: {0}")]
    Docker(String),

    #[error("internal storage error: {0}")]
    Storage(String),
}

impl SandboxError {
    /// HTTP status this error is reported as at the public surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SandboxError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SandboxError::NotFound(_) => StatusCode::NOT_FOUND,
            SandboxError::TokenNotFound(_) => StatusCode::NOT_FOUND,
            SandboxError::AuthMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SandboxError::RoutingMiss(_) => StatusCode::NOT_FOUND,
            SandboxError::AlreadyExists(_) => StatusCode::CONFLICT,
            SandboxError::SandboxSetupFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SandboxError::UpstreamStreamBroken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SandboxError::UpstreamGatewayError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            SandboxError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SandboxError::Docker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SandboxError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for SandboxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SandboxError::Timeout(err.to_string())
        } else {
            SandboxError::UpstreamStreamBroken(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for SandboxError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SandboxError::AuthMissing(err.to_string())
    }
}

impl From<serde_json::Error> for SandboxError {
    fn from(err: serde_json::Error) -> Self {
        SandboxError::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        SandboxError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
