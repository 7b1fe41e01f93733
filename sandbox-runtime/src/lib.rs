//! Core runtime shared by the investigation orchestration plane: sandbox
//! container lifecycle, the JWT session vault, single-use file download
//! tokens, the internal router client, rate limiting, metrics and
//! configuration.
//!
//! The public HTTP surface built on top of these primitives lives in the
//! `stream-broker` crate; this crate has no axum routes of its own beyond
//! the middleware in [`rate_limit`].

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod fileproxy;
pub mod metrics;
pub mod rate_limit;
pub mod reaper;
pub mod router;
pub mod runtime;
pub mod store;
pub mod util;
pub mod vault;

pub use config::OrchestratorConfig;
pub use error::SandboxError;
pub use events::{QuestionSpec, StreamEvent, StreamEventEnvelope};
pub use runtime::{CreateSandboxParams, SandboxInfo, SandboxState};

pub const DEFAULT_SIDECAR_IMAGE: &str = "ghcr.io/investigations/sandbox-agent:latest";
pub const DEFAULT_SIDECAR_HTTP_PORT: u16 = 8888;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
