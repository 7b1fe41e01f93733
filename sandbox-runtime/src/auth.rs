//! Sandbox capability tokens: signed JWTs and single-use download
//! tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use once_cell::sync::OnceCell;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Claims carried by a `SandboxJWT`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxClaims {
    pub tenant_id: String,
    pub team_id: String,
    pub thread_id: String,
    pub sandbox_name: String,
    pub iat: u64,
    pub exp: u64,
}

static SIGNING_KEY: OnceCell<String> = OnceCell::new();

/// Resolve the JWT signing key.
///
/// Precedence (see DESIGN.md for the reasoning):
/// [`crate::config::OrchestratorConfig::jwt_secret`] (itself sourced from
/// `SANDBOX_JWT_SECRET`) takes precedence; if unset, a process-random key is
/// generated once and held only in memory, so every process restart
/// invalidates outstanding JWTs in non-production setups. Production
/// deployments are expected to always set the env var.
fn signing_key() -> &'static str {
    SIGNING_KEY.get_or_init(|| match &crate::config::OrchestratorConfig::load().jwt_secret {
        Some(key) => key.clone(),
        None => {
            tracing::warn!(
                "SANDBOX_JWT_SECRET not set; using an ephemeral process-random signing key"
            );
            generate_download_token()
        }
    })
}

/// Sign a new `SandboxJWT` for the given claims.
pub fn mint_jwt(claims: &SandboxClaims) -> Result<String> {
    let key = EncodingKey::from_secret(signing_key().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(SandboxError::from)
}

/// Verify and decode a `SandboxJWT`. Checks signature and `exp`.
pub fn verify_jwt(token: &str) -> Result<SandboxClaims> {
    let key = DecodingKey::from_secret(signing_key().as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<SandboxClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(SandboxError::from)
}

/// Generate a random lowercase-hex token of `nbytes` random bytes.
///
/// Shared primitive behind [`generate_download_token`] and the StreamBroker's
/// random `thread_id` generation for `/investigate` calls that omit one —
/// hex output is already DNS-1123-safe with no further sanitizing needed.
pub fn generate_token(nbytes: usize) -> String {
    let mut bytes = vec![0u8; nbytes];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a cryptographically random, URL-safe, ≥128-bit token suitable
/// for single-use download tokens.
pub fn generate_download_token() -> String {
    generate_token(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(thread_id: &str, exp: u64) -> SandboxClaims {
        SandboxClaims {
            tenant_id: "tenant-a".into(),
            team_id: "team-a".into(),
            thread_id: thread_id.into(),
            sandbox_name: format!("investigation-{thread_id}"),
            iat: 0,
            exp,
        }
    }

    #[test]
    fn mint_and_verify_roundtrip() {
        let claims = sample_claims("abc123", crate::util::now_ts() + 3600);
        let token = mint_jwt(&claims).unwrap();
        let decoded = verify_jwt(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn expired_token_rejected() {
        let claims = sample_claims("abc123", 1);
        let token = mint_jwt(&claims).unwrap();
        assert!(verify_jwt(&token).is_err());
    }

    #[test]
    fn download_tokens_are_unique_and_long() {
        let a = generate_download_token();
        let b = generate_download_token();
        assert_ne!(a, b);
        assert!(a.len() >= 32);
    }
}
