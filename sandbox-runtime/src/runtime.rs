//! SandboxManager: create/look-up/wait-for-ready/delete sandbox
//! workloads on the container orchestrator, and the `/execute`, `/interrupt`,
//! `/answer` entry points that go through the [`crate::router`] client.
//!
//! Backed by Docker via `docktopus`/`bollard`: a local container
//! runtime is the natural dev/test analogue of "workload Running and
//! readiness condition True" on a real cluster scheduler. A
//! `SIDECAR_MOCK_URL` escape hatch (teacher's `container_id == "mock"`
//! pattern) exists purely for tests, never for production code paths.

use std::collections::HashMap;
use std::time::Duration;

use docktopus::DockerBuilder;
use docktopus::bollard::container::{Config as BollardConfig, InspectContainerOptions};
use docktopus::bollard::models::{HostConfig, PortBinding, PortMap};
use docktopus::container::Container;
use once_cell::sync::OnceCell;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell as AsyncOnceCell;

use crate::config::OrchestratorConfig;
use crate::error::{Result, SandboxError};
use crate::router;
use crate::store::PersistentStore;
use crate::util::{now_ts, sandbox_name_for};

/// Lifecycle states of a sandbox resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxState {
    Pending,
    Ready,
    Running,
    Terminating,
    Deleted,
}

/// Everything the orchestrator knows about one thread's sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub name: String,
    pub thread_id: String,
    pub tenant_id: String,
    pub team_id: String,
    pub created_at: u64,
    pub namespace: String,
    pub shutdown_at: u64,
    pub state: SandboxState,
    pub container_id: String,
    pub sandbox_port: u16,
    pub host_port: u16,
    /// Whether `/claim` has been called for this sandbox yet.
    pub claimed: bool,
}

impl SandboxInfo {
    /// Base URL for direct (non-router) calls — used only by `wait_for_ready`'s
    /// orchestrator-level health probe, never by `/execute`/`/interrupt`.
    fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}/health", self.host_port)
    }
}

/// Parameters for creating a sandbox.
#[derive(Clone, Debug)]
pub struct CreateSandboxParams {
    pub thread_id: String,
    pub tenant_id: String,
    pub team_id: String,
    pub jwt_token: String,
    pub team_token: Option<String>,
    /// Secret-ref table for optional upstream credentials the agent may need
    /// — e.g. `{"GITHUB_TOKEN": "..."}`. Never logged.
    pub extra_env: HashMap<String, String>,
}

static SANDBOXES: OnceCell<PersistentStore<SandboxInfo>> = OnceCell::new();
static DOCKER_BUILDER: AsyncOnceCell<DockerBuilder> = AsyncOnceCell::const_new();

pub fn sandboxes() -> &'static PersistentStore<SandboxInfo> {
    SANDBOXES.get_or_init(PersistentStore::new)
}

async fn docker_builder() -> Result<&'static DockerBuilder> {
    DOCKER_BUILDER
        .get_or_try_init(|| async {
            DockerBuilder::new()
                .await
                .map_err(|err| SandboxError::Docker(format!("failed to connect to docker: {err}")))
        })
        .await
}

fn build_env_vars(params: &CreateSandboxParams, config: &OrchestratorConfig) -> Vec<String> {
    let mut env = vec![
        format!("THREAD_ID={}", params.thread_id),
        format!("SANDBOX_NAME={}", sandbox_name_for(&params.thread_id)),
        format!("TENANT_ID={}", params.tenant_id),
        format!("TEAM_ID={}", params.team_id),
        format!("SANDBOX_JWT={}", params.jwt_token),
        format!("SANDBOX_PORT={}", config.sandbox_port),
    ];
    if let Some(team_token) = &params.team_token {
        env.push(format!("TEAM_TOKEN={team_token}"));
    }
    for (key, value) in &params.extra_env {
        env.push(format!("{key}={value}"));
    }
    env
}

fn build_docker_config(config: &OrchestratorConfig) -> BollardConfig<String> {
    let mut port_bindings = PortMap::new();
    port_bindings.insert(
        format!("{}/tcp", config.sandbox_port),
        Some(vec![PortBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: None,
        }]),
    );
    let mut exposed_ports = HashMap::new();
    exposed_ports.insert(format!("{}/tcp", config.sandbox_port), HashMap::new());

    BollardConfig {
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn extract_host_port(
    inspect: &docktopus::bollard::models::ContainerInspectResponse,
    container_port: u16,
) -> Result<u16> {
    let ports = inspect
        .network_settings
        .as_ref()
        .and_then(|settings| settings.ports.as_ref())
        .ok_or_else(|| SandboxError::Docker("missing container port mappings".into()))?;
    let key = format!("{container_port}/tcp");
    ports
        .get(&key)
        .and_then(|v| v.as_ref())
        .and_then(|bindings| bindings.first())
        .and_then(|binding| binding.host_port.as_ref())
        .and_then(|port| port.parse::<u16>().ok())
        .ok_or_else(|| SandboxError::Docker(format!("missing host port for {key}")))
}

/// Create a sandbox for `params.thread_id`.
///
/// Returns immediately after the create call succeeds; readiness is *not*
/// implied.
pub async fn create_sandbox(params: &CreateSandboxParams) -> Result<SandboxInfo> {
    if !crate::util::is_valid_dns1123_label(&params.thread_id) {
        return Err(SandboxError::BadRequest(format!(
            "thread_id '{}' is not a valid DNS-1123 label",
            params.thread_id
        )));
    }
    if params.jwt_token.trim().is_empty() {
        return Err(SandboxError::BadRequest("jwt_token must not be empty".into()));
    }
    if sandboxes().get(&params.thread_id).is_some() {
        return Err(SandboxError::AlreadyExists(params.thread_id.clone()));
    }

    let config = OrchestratorConfig::load();

    if let Some(mock_url) = &config.sidecar_mock_url {
        let info = mock_sandbox_info(params, config, mock_url);
        sandboxes().insert(&params.thread_id, info.clone());
        crate::metrics::metrics().sandboxes_created_total.inc();
        crate::metrics::metrics().sandboxes_active.inc();
        return Ok(info);
    }

    let builder = docker_builder().await?;
    let name = sandbox_name_for(&params.thread_id);
    let env_vars = build_env_vars(params, config);
    let override_config = build_docker_config(config);

    let mut container = Container::new(builder.client(), config.sandbox_image.clone())
        .with_name(name.clone())
        .env(env_vars)
        .config_override(override_config);

    container.start(false).await.map_err(|err| {
        SandboxError::SandboxSetupFailed(format!("failed to start sandbox container: {err}"))
    })?;

    let container_id = container
        .id()
        .ok_or_else(|| SandboxError::SandboxSetupFailed("missing container id".into()))?
        .to_string();

    let inspect = builder
        .client()
        .inspect_container(&container_id, None::<InspectContainerOptions>)
        .await
        .map_err(|err| SandboxError::Docker(format!("failed to inspect container: {err}")))?;

    let host_port = extract_host_port(&inspect, config.sandbox_port)?;
    let now = now_ts();

    let info = SandboxInfo {
        name,
        thread_id: params.thread_id.clone(),
        tenant_id: params.tenant_id.clone(),
        team_id: params.team_id.clone(),
        created_at: now,
        namespace: config.sandbox_namespace.clone(),
        shutdown_at: now + config.sandbox_ttl.as_secs(),
        state: SandboxState::Pending,
        container_id,
        sandbox_port: config.sandbox_port,
        host_port,
        claimed: false,
    };
    sandboxes().insert(&params.thread_id, info.clone());
    crate::metrics::metrics().sandboxes_created_total.inc();
    crate::metrics::metrics().sandboxes_active.inc();
    Ok(info)
}

fn mock_sandbox_info(
    params: &CreateSandboxParams,
    config: &OrchestratorConfig,
    mock_url: &str,
) -> SandboxInfo {
    let port = mock_url
        .rsplit(':')
        .next()
        .and_then(|p| p.trim_end_matches('/').parse::<u16>().ok())
        .unwrap_or(config.sandbox_port);
    let now = now_ts();
    SandboxInfo {
        name: sandbox_name_for(&params.thread_id),
        thread_id: params.thread_id.clone(),
        tenant_id: params.tenant_id.clone(),
        team_id: params.team_id.clone(),
        created_at: now,
        namespace: config.sandbox_namespace.clone(),
        shutdown_at: now + config.sandbox_ttl.as_secs(),
        state: SandboxState::Ready,
        container_id: "mock".to_string(),
        sandbox_port: config.sandbox_port,
        host_port: port,
        claimed: false,
    }
}

/// Idempotent lookup.
pub fn get_sandbox(thread_id: &str) -> Option<SandboxInfo> {
    sandboxes().get(thread_id)
}

/// Poll until the workload is `Running` with readiness `True`, or `timeout`
/// elapses. Does not itself verify the agent endpoint — the first
/// `/execute` will. Mock sandboxes are always immediately ready.
pub async fn wait_for_ready(thread_id: &str, timeout: Duration) -> bool {
    let Some(info) = sandboxes().get(thread_id) else {
        return false;
    };
    if info.container_id == "mock" {
        return true;
    }

    let config = OrchestratorConfig::load();
    let poll_interval = config.sandbox_ready_poll_interval;
    let client = match crate::util::http_client() {
        Ok(client) => client.clone(),
        Err(_) => return false,
    };
    let health_url = info.health_url();

    let ready = tokio::time::timeout(timeout, async {
        loop {
            if let Ok(resp) = client.get(&health_url).send().await {
                if resp.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    })
    .await
    .is_ok();

    if ready {
        let _ = sandboxes().update(thread_id, |record| record.state = SandboxState::Running);
    }
    ready
}

/// Idempotent delete; swallows not-found.
pub async fn delete_sandbox(thread_id: &str) -> Result<()> {
    let Some(info) = sandboxes().remove(thread_id) else {
        return Ok(());
    };
    crate::metrics::metrics().sandboxes_active.dec();

    if info.container_id == "mock" {
        return Ok(());
    }

    let builder = docker_builder().await?;
    let container = Container::from_id(builder.client(), &info.container_id)
        .await
        .map_err(|err| SandboxError::Docker(format!("failed to load container: {err}")))?;
    // Deletion is best-effort: a container already gone is not an error here.
    let _ = container.stop().await;
    let _ = builder
        .client()
        .remove_container(
            &info.container_id,
            Some(docktopus::bollard::container::RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await;
    Ok(())
}

/// `POST /execute` through the SandboxRouter.
pub async fn execute_in_sandbox(
    info: &SandboxInfo,
    prompt: &str,
    images: Option<Value>,
    file_downloads: Option<Value>,
) -> Result<Response> {
    router::execute(info, &info.thread_id, prompt, images, file_downloads).await
}

/// `POST /interrupt` through the SandboxRouter.
pub async fn interrupt_sandbox(info: &SandboxInfo) -> Result<Response> {
    router::interrupt(info, &info.thread_id).await
}

/// `POST /answer` through the SandboxRouter.
pub async fn send_answer_to_sandbox(info: &SandboxInfo, answers: &Value) -> Result<(reqwest::StatusCode, Value)> {
    router::answer(info, &info.thread_id, answers).await
}

/// `POST /claim`: inject the JWT into a fresh sandbox before its
/// first `/execute`. Marks the record claimed so repeated calls are cheap
/// no-ops for callers that don't track this themselves.
pub async fn claim_sandbox(thread_id: &str, jwt: &str, team_token: Option<&str>) -> Result<()> {
    let info = sandboxes()
        .get(thread_id)
        .ok_or_else(|| SandboxError::NotFound(thread_id.to_string()))?;
    router::claim(&info, jwt, team_token).await?;
    let _ = sandboxes().update(thread_id, |record| record.claimed = true);
    Ok(())
}
