//! FileProxy: single-use, TTL-bounded download capability tokens that
//! let a sandbox fetch one upstream file through the orchestrator without
//! ever observing the upstream credential.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::auth::generate_download_token;
use crate::config::OrchestratorConfig;
use crate::error::{Result, SandboxError};
use crate::store::PersistentStore;
use crate::util::now_ts;

/// A minted, not-yet-consumed download token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToken {
    pub token: String,
    pub upstream_url: String,
    /// Never serialized into any response seen outside this crate.
    pub upstream_auth: String,
    pub filename: String,
    pub size: u64,
    pub media_type: String,
    pub created_at: u64,
}

static TOKENS: OnceCell<PersistentStore<DownloadToken>> = OnceCell::new();

fn tokens() -> &'static PersistentStore<DownloadToken> {
    TOKENS.get_or_init(PersistentStore::new)
}

/// Mint a single-use download token for an upstream file.
pub fn mint(upstream_url: &str, upstream_auth: &str, filename: &str, size: u64, media_type: &str) -> DownloadToken {
    let token = generate_download_token();
    let entry = DownloadToken {
        token: token.clone(),
        upstream_url: upstream_url.to_string(),
        upstream_auth: upstream_auth.to_string(),
        filename: filename.to_string(),
        size,
        media_type: media_type.to_string(),
        created_at: now_ts(),
    };
    tokens().insert(&token, entry.clone());
    crate::metrics::metrics().download_tokens_minted_total.inc();
    entry
}

/// Build the externally reachable URL a sandbox uses to redeem `token`.
pub fn proxy_url_for(token: &str) -> String {
    let base = OrchestratorConfig::load()
        .file_proxy_public_base_url
        .trim_end_matches('/')
        .to_string();
    format!("{base}/proxy/files/{token}")
}

fn is_expired(entry: &DownloadToken, now: u64) -> bool {
    let ttl = OrchestratorConfig::load().download_token_ttl.as_secs();
    now.saturating_sub(entry.created_at) > ttl
}

/// Validate and consume a token.
///
/// The token is removed from the store *before* the caller streams the first
/// byte (replay resistance): a second consumer, concurrent or sequential,
/// always observes [`SandboxError::TokenNotFound`].
pub fn consume(token: &str) -> Result<DownloadToken> {
    let now = now_ts();
    match tokens().remove(token) {
        Some(entry) if !is_expired(&entry, now) => {
            crate::metrics::metrics().download_tokens_consumed_total.inc();
            Ok(entry)
        }
        Some(_expired) => Err(SandboxError::TokenNotFound(token.to_string())),
        None => Err(SandboxError::TokenNotFound(token.to_string())),
    }
}

/// Opportunistic GC of expired tokens, run on every health probe.
/// Returns the number of tokens removed.
pub fn gc_expired() -> usize {
    let now = now_ts();
    let expired: Vec<String> = tokens()
        .values()
        .into_iter()
        .filter(|entry| is_expired(entry, now))
        .map(|entry| entry.token)
        .collect();
    let removed = expired.len();
    for token in expired {
        tokens().remove(&token);
    }
    removed
}

/// Count of tokens currently held, for `/health`.
pub fn active_count() -> usize {
    tokens().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn single_use_second_consumer_gets_not_found() {
        let entry = mint("https://up.example/f", "Bearer SECRET", "data.csv", 1024, "text/csv");
        assert!(consume(&entry.token).is_ok());
        let second = consume(&entry.token);
        assert!(matches!(second, Err(SandboxError::TokenNotFound(_))));
    }

    #[test]
    #[serial]
    fn proxy_url_never_exposes_upstream_auth() {
        let entry = mint("https://up.example/f", "Bearer SECRET", "data.csv", 1024, "text/csv");
        let url = proxy_url_for(&entry.token);
        assert!(!url.contains("SECRET"));
    }

    #[test]
    #[serial]
    fn gc_removes_entries_past_ttl() {
        let token = generate_download_token();
        tokens().insert(
            &token,
            DownloadToken {
                token: token.clone(),
                upstream_url: "https://up.example/f".into(),
                upstream_auth: "Bearer SECRET".into(),
                filename: "old.csv".into(),
                size: 1,
                media_type: "text/csv".into(),
                created_at: 0, // far in the past
            },
        );
        let removed = gc_expired();
        assert!(removed >= 1);
        assert!(matches!(consume(&token), Err(SandboxError::TokenNotFound(_))));
    }
}
