//! TokenVault: `thread_id -> (jwt, expiry, tenant_id, team_id)`.
//!
//! Session lifetime is decoupled from sandbox lifetime by design: the vault
//! is the source of truth for a thread's identity, not the sandbox. A user
//! asking a follow-up hours after their sandbox was reclaimed gets the same
//! logical session rather than a new one.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::auth::{self, SandboxClaims};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::store::PersistentStore;
use crate::util::{now_ts, sandbox_name_for};

/// A thread's session entry: its current JWT and when it expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub jwt: String,
    pub expiry: u64,
    pub tenant_id: String,
    pub team_id: String,
}

static SESSIONS: OnceCell<PersistentStore<SessionEntry>> = OnceCell::new();

fn sessions() -> &'static PersistentStore<SessionEntry> {
    SESSIONS.get_or_init(PersistentStore::new)
}

/// Mint-or-reuse the `SandboxJWT` for `thread_id`.
///
/// If an entry exists *and* its remaining lifetime exceeds the configured
/// reuse threshold, it is returned unchanged (byte-identical JWT). Otherwise
/// a new JWT is minted and stored. The read-decide-write sequence runs
/// inside a single [`PersistentStore::upsert`] call, which holds that key's
/// shard lock for the whole closure — including the `mint_jwt` call — so two
/// concurrent callers for the same `thread_id` can never both observe a miss
/// and each mint their own JWT. The lock is per-key, so other threads are
/// unaffected, and `mint_jwt` is CPU-only signing with no network suspension
/// point, so holding the shard across it does not block unrelated work for
/// long.
pub fn get_or_create(thread_id: &str, tenant_id: &str, team_id: &str) -> Result<SessionEntry> {
    let config = OrchestratorConfig::load();
    let now = now_ts();
    let reuse_threshold = config.jwt_reuse_threshold.as_secs();
    let reused = std::cell::Cell::new(false);

    sessions().upsert(thread_id, |existing| {
        if let Some(entry) = existing {
            if entry.expiry > now && entry.expiry - now > reuse_threshold {
                reused.set(true);
                return Ok(entry.clone());
            }
        }

        let exp = now + config.jwt_ttl.as_secs();
        let claims = SandboxClaims {
            tenant_id: tenant_id.to_string(),
            team_id: team_id.to_string(),
            thread_id: thread_id.to_string(),
            sandbox_name: sandbox_name_for(thread_id),
            iat: now,
            exp,
        };
        let jwt = auth::mint_jwt(&claims)?;
        Ok(SessionEntry {
            jwt,
            expiry: exp,
            tenant_id: tenant_id.to_string(),
            team_id: team_id.to_string(),
        })
    })
    .inspect(|_| {
        if reused.get() {
            crate::metrics::metrics().jwt_reused_total.inc();
        } else {
            crate::metrics::metrics().jwt_minted_total.inc();
        }
    })
}

/// Look up the current session for a thread without minting, if any.
pub fn peek(thread_id: &str) -> Option<SessionEntry> {
    sessions().get(thread_id)
}
