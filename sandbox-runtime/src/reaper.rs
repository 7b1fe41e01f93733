//! Background sweep of expired sandboxes and download tokens.
//!
//! Unlike the teacher's reaper (which uploaded S3 snapshots and docker
//! committed images before stopping a container so it could be resumed
//! later), this orchestration plane treats a sandbox as disposable
//! compute: when its TTL lapses there is nothing to preserve, so the sweep
//! is just "delete anything past `shutdown_at`".

use crate::runtime::{SandboxState, delete_sandbox, sandboxes};
use crate::util::now_ts;

/// Delete every sandbox whose `shutdown_at` has passed.
///
/// Called on a fixed interval from the binary's background task. A sandbox
/// mid-deletion (state already `Terminating`/`Deleted`) is skipped rather
/// than double-deleted.
pub async fn reaper_tick() {
    let now = now_ts();
    let expired: Vec<String> = sandboxes()
        .values()
        .into_iter()
        .filter(|record| {
            record.shutdown_at <= now
                && !matches!(record.state, SandboxState::Terminating | SandboxState::Deleted)
        })
        .map(|record| record.thread_id)
        .collect();

    for thread_id in expired {
        tracing::info!(thread_id = %thread_id, "reaper: sandbox past ttl, deleting");
        if let Err(err) = delete_sandbox(&thread_id).await {
            tracing::error!(thread_id = %thread_id, error = %err, "reaper: failed to delete sandbox");
        }
    }
}

/// Opportunistic GC of expired download tokens. Cheap enough to run from the
/// same tick as [`reaper_tick`], and also run inline on every `/health` call.
pub fn gc_expired_tokens() -> usize {
    crate::fileproxy::gc_expired()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CreateSandboxParams, create_sandbox, get_sandbox};
    use serial_test::serial;
    use std::collections::HashMap;

    #[tokio::test]
    #[serial]
    async fn reaper_deletes_sandboxes_past_shutdown_at() {
        unsafe { std::env::set_var("SIDECAR_MOCK_URL", "http://localhost:9999") };
        let thread_id = format!("thread-reaper-{}", now_ts());
        let params = CreateSandboxParams {
            thread_id: thread_id.clone(),
            tenant_id: "tenant-a".into(),
            team_id: "team-a".into(),
            jwt_token: "jwt.token.value".into(),
            team_token: None,
            extra_env: HashMap::new(),
        };
        create_sandbox(&params).await.unwrap();
        let _ = sandboxes().update(&thread_id, |record| record.shutdown_at = 0);

        reaper_tick().await;

        assert!(get_sandbox(&thread_id).is_none());
    }
}
