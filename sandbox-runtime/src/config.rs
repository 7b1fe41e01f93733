//! Process-wide configuration, loaded once from the environment.
//!
//! Mirrors the teacher's `SidecarRuntimeConfig::load()` pattern: a
//! `OnceCell`-memoized loader, each field read via `std::env::var` with an
//! explicit default, no external config-file format introduced.

use std::env;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::DEFAULT_SIDECAR_IMAGE;

static CONFIG: OnceCell<OrchestratorConfig> = OnceCell::new();

/// Effective configuration for a single orchestration-plane process.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Default tenant used when `/investigate` omits `tenant_id` (local/dev mode).
    pub default_tenant_id: String,
    /// Default team used when `/investigate` omits `team_id` (local/dev mode).
    pub default_team_id: String,

    /// Sandbox agent container image.
    pub sandbox_image: String,
    /// Orchestrator-level namespace sandboxes are created in.
    pub sandbox_namespace: String,
    /// Sandbox agent's HTTP port inside the container (`X-Sandbox-Port`).
    pub sandbox_port: u16,
    /// Default sandbox TTL; `shutdown_at = created_at + ttl`.
    pub sandbox_ttl: Duration,
    /// Poll interval used by `wait_for_ready`.
    pub sandbox_ready_poll_interval: Duration,
    /// Hard timeout for `wait_for_ready` / the `/investigate` readiness wait.
    pub sandbox_ready_timeout: Duration,

    /// SandboxRouter base URL. A local-port override takes precedence over the
    /// in-namespace service DNS name, mirroring the original's
    /// `SandboxManager.get_router_url()`.
    pub router_local_port: Option<u16>,
    pub router_namespace: String,
    pub router_service_name: String,

    /// This orchestrator's own externally reachable base URL, used to build
    /// `proxy_url` for download tokens.
    pub file_proxy_public_base_url: String,
    /// Download token TTL.
    pub download_token_ttl: Duration,
    /// File proxy upstream connect+read budget.
    pub file_proxy_upstream_timeout: Duration,

    /// HS256 signing key for sandbox JWTs, resolved with env precedence.
    pub jwt_secret: Option<String>,
    /// Sandbox JWT TTL.
    pub jwt_ttl: Duration,
    /// Reuse threshold: a JWT is reminted only when its remaining lifetime
    /// drops below this.
    pub jwt_reuse_threshold: Duration,

    /// Bounded request timeout for `/execute` upstream calls.
    pub sandbox_request_timeout: Duration,

    /// `CORS_ALLOWED_ORIGINS`, comma-separated; empty/unset means permissive.
    pub cors_allowed_origins: Option<String>,

    /// Address the StreamBroker HTTP server binds to.
    pub bind_addr: String,

    /// Escape hatch for local/test runs: when set, the sandbox runtime backend
    /// skips Docker entirely and treats every sandbox as backed by this URL
    /// (teacher's `SIDECAR_MOCK_URL` / `container_id == "mock"` pattern).
    pub sidecar_mock_url: Option<String>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl OrchestratorConfig {
    /// Load configuration from environment variables. Cached after the first
    /// call — subsequent calls return the same config.
    pub fn load() -> &'static OrchestratorConfig {
        CONFIG.get_or_init(Self::load_fresh)
    }

    fn load_fresh() -> OrchestratorConfig {
        let jwt_secret = env::var("SANDBOX_JWT_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let sidecar_mock_url = env::var("SIDECAR_MOCK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        // Only logged: which optional keys were present, never their values.
        tracing::info!(
            jwt_secret_set = jwt_secret.is_some(),
            cors_configured = cors_allowed_origins.is_some(),
            sidecar_mock_configured = sidecar_mock_url.is_some(),
            "orchestrator configuration loaded"
        );

        OrchestratorConfig {
            default_tenant_id: env_string("DEFAULT_TENANT_ID", "default-tenant"),
            default_team_id: env_string("DEFAULT_TEAM_ID", "default-team"),

            sandbox_image: env_string("SANDBOX_IMAGE", DEFAULT_SIDECAR_IMAGE),
            sandbox_namespace: env_string("SANDBOX_NAMESPACE", "investigations"),
            sandbox_port: env_u64("SANDBOX_PORT", 8888) as u16,
            sandbox_ttl: Duration::from_secs(env_u64("SANDBOX_TTL_HOURS", 2) * 3600),
            sandbox_ready_poll_interval: Duration::from_millis(env_u64(
                "SANDBOX_READY_POLL_MS",
                2000,
            )),
            sandbox_ready_timeout: Duration::from_secs(env_u64(
                "SANDBOX_READY_TIMEOUT_SECONDS",
                120,
            )),

            router_local_port: env::var("ROUTER_LOCAL_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok()),
            router_namespace: env_string("ROUTER_NAMESPACE", "investigations"),
            router_service_name: env_string("SANDBOX_ROUTER_SERVICE", "sandbox-router"),

            file_proxy_public_base_url: env_string(
                "FILE_PROXY_URL",
                "http://localhost:8080",
            ),
            download_token_ttl: Duration::from_secs(env_u64(
                "DOWNLOAD_TOKEN_TTL_SECONDS",
                3600,
            )),
            file_proxy_upstream_timeout: Duration::from_secs(env_u64(
                "FILE_PROXY_UPSTREAM_TIMEOUT_SECONDS",
                300,
            )),

            jwt_secret,
            jwt_ttl: Duration::from_secs(env_u64("SANDBOX_JWT_TTL_HOURS", 24) * 3600),
            jwt_reuse_threshold: Duration::from_secs(
                env_u64("SANDBOX_JWT_REUSE_THRESHOLD_MINUTES", 30) * 60,
            ),

            sandbox_request_timeout: Duration::from_secs(env_u64(
                "SANDBOX_REQUEST_TIMEOUT_SECONDS",
                300,
            )),

            cors_allowed_origins,
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
            sidecar_mock_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_env_unset() {
        // Best-effort: if another test already initialized the OnceCell within
        // this process, this just asserts the memoized values are sane.
        let config = OrchestratorConfig::load();
        assert!(!config.default_tenant_id.is_empty());
        assert!(config.jwt_ttl >= config.jwt_reuse_threshold);
    }
}
