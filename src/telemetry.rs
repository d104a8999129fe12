// telemetry.rs
use hdrhistogram::{CreationError, Histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub fetches: u64,
    pub failures: u64,
    pub discarded: u64,
}

pub struct PollStats {
    fetch_rtt: Mutex<Histogram<u64>>,
    failures: AtomicU64,
    discarded: AtomicU64,
}

impl PollStats {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            fetch_rtt: Mutex::new(Histogram::new_with_max(60_000, 3)?), // up to 60s in ms
            failures: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    pub async fn record_fetch_ms(&self, v_ms: u64) {
        let mut h = self.fetch_rtt.lock().await;
        let _ = h.record(v_ms.min(60_000));
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub async fn summary(&self) -> PollSummary {
        let h = self.fetch_rtt.lock().await;
        PollSummary {
            p50_ms: h.value_at_quantile(0.50) as f64,
            p95_ms: h.value_at_quantile(0.95) as f64,
            p99_ms: h.value_at_quantile(0.99) as f64,
            fetches: h.len(),
            failures: self.failures(),
            discarded: self.discarded(),
        }
    }
}
