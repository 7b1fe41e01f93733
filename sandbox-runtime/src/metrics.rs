//! Process-wide metrics counters, supplemented from the teacher's
//! `OnChainMetrics` shape but narrowed to what this orchestration plane
//! actually measures and exposed as Prometheus text exposition on `GET
//! /metrics`, exactly as the teacher's `operator_api.rs` handler does.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// A monotonically increasing counter.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge that can move up and down (e.g. currently-active sandboxes).
#[derive(Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Global metrics tracker using atomic counters. All counters use relaxed
/// ordering — they are approximate gauges/counters read periodically by
/// `/metrics`, so strict ordering isn't needed.
#[derive(Default)]
pub struct OrchestratorMetrics {
    pub investigations_total: Counter,
    pub investigations_failed_total: Counter,
    pub sandboxes_created_total: Counter,
    pub sandboxes_reused_total: Counter,
    pub sandboxes_active: Gauge,
    pub download_tokens_minted_total: Counter,
    pub download_tokens_consumed_total: Counter,
    pub jwt_minted_total: Counter,
    pub jwt_reused_total: Counter,
    pub sse_streams_clean_close_total: Counter,
    pub sse_streams_broken_total: Counter,
}

impl OrchestratorMetrics {
    /// Render this snapshot as Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let lines = [
            ("sandbox_investigations_total", self.investigations_total.get() as i64),
            (
                "sandbox_investigations_failed_total",
                self.investigations_failed_total.get() as i64,
            ),
            (
                "sandbox_sandboxes_created_total",
                self.sandboxes_created_total.get() as i64,
            ),
            (
                "sandbox_sandboxes_reused_total",
                self.sandboxes_reused_total.get() as i64,
            ),
            ("sandbox_sandboxes_active", self.sandboxes_active.get()),
            (
                "sandbox_download_tokens_minted_total",
                self.download_tokens_minted_total.get() as i64,
            ),
            (
                "sandbox_download_tokens_consumed_total",
                self.download_tokens_consumed_total.get() as i64,
            ),
            ("sandbox_jwt_minted_total", self.jwt_minted_total.get() as i64),
            ("sandbox_jwt_reused_total", self.jwt_reused_total.get() as i64),
            (
                "sandbox_sse_streams_clean_close_total",
                self.sse_streams_clean_close_total.get() as i64,
            ),
            (
                "sandbox_sse_streams_broken_total",
                self.sse_streams_broken_total.get() as i64,
            ),
        ];

        let mut out = String::new();
        for (name, value) in lines {
            out.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        }
        out
    }

    /// Key/value snapshot, handy for tests and non-Prometheus consumers.
    pub fn snapshot(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("investigations_total", self.investigations_total.get() as i64),
            ("sandboxes_active", self.sandboxes_active.get()),
            (
                "download_tokens_minted_total",
                self.download_tokens_minted_total.get() as i64,
            ),
        ]
    }
}

static METRICS: OnceLock<OrchestratorMetrics> = OnceLock::new();
static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Access the process-wide metrics singleton.
pub fn metrics() -> &'static OrchestratorMetrics {
    METRICS.get_or_init(OrchestratorMetrics::default)
}

/// Process uptime in seconds, for `/health`.
pub fn uptime_secs() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}
