use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::OnceCell;
use reqwest::Client;

use crate::config::OrchestratorConfig;
use crate::error::{Result, SandboxError};

static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared HTTP client for all outbound calls (SandboxRouter, file proxy
/// upstream, ConfigClient). Timeout is set from [`OrchestratorConfig`] on
/// first initialization and reused for all subsequent calls.
pub fn http_client() -> Result<&'static Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        let config = OrchestratorConfig::load();
        Client::builder()
            .timeout(config.sandbox_request_timeout)
            .build()
            .map_err(|err| SandboxError::Storage(format!("failed to build HTTP client: {err}")))
    })
}

/// Current Unix timestamp in seconds.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Whether `s` is a valid DNS-1123 label segment: lowercase alphanumerics and
/// `-`, not starting or ending with `-`, 1..=63 chars.
///
/// `thread_id` values must satisfy this, since `sandbox_name` is built by
/// prefixing `"investigation-"` onto them.
pub fn is_valid_dns1123_label(s: &str) -> bool {
    if s.is_empty() || s.len() > 63 {
        return false;
    }
    if s.starts_with('-') || s.ends_with('-') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Name of the sandbox resource for a given thread, e.g. `investigation-abc123`.
pub fn sandbox_name_for(thread_id: &str) -> String {
    format!("investigation-{thread_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_labels() {
        assert!(is_valid_dns1123_label("abc-123"));
        assert!(is_valid_dns1123_label("a"));
    }

    #[test]
    fn rejects_bad_labels() {
        assert!(!is_valid_dns1123_label(""));
        assert!(!is_valid_dns1123_label("-abc"));
        assert!(!is_valid_dns1123_label("abc-"));
        assert!(!is_valid_dns1123_label("Abc"));
        assert!(!is_valid_dns1123_label("abc_123"));
        assert!(!is_valid_dns1123_label(&"a".repeat(64)));
    }

    #[test]
    fn sandbox_name_prefixes_thread_id() {
        assert_eq!(sandbox_name_for("abc123"), "investigation-abc123");
    }
}
