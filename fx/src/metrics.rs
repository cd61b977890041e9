//! Counters for rate store monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Rate store metrics.
pub struct RateStoreMetrics {
    /// Requests answered from a fresh cache entry.
    pub cache_hits: AtomicU64,
    /// Provider fetches started.
    pub fetches_started: AtomicU64,
    /// Provider fetches that produced a valid table.
    pub fetches_succeeded: AtomicU64,
    /// Provider fetches that failed, timed out, or were rejected.
    pub fetches_failed: AtomicU64,
    /// Callers that joined a fetch already in flight.
    pub coalesced_waits: AtomicU64,
    /// Requests answered with a stale table after a failed refresh.
    pub stale_served: AtomicU64,
}

impl RateStoreMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            fetches_started: AtomicU64::new(0),
            fetches_succeeded: AtomicU64::new(0),
            fetches_failed: AtomicU64::new(0),
            coalesced_waits: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_succeeded(&self) {
        self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP tradesim_fx_cache_hits Requests served from a fresh rate table
# TYPE tradesim_fx_cache_hits counter
tradesim_fx_cache_hits {}

# HELP tradesim_fx_fetches_started Rate provider fetches started
# TYPE tradesim_fx_fetches_started counter
tradesim_fx_fetches_started {}

# HELP tradesim_fx_fetches_succeeded Rate provider fetches that installed a new table
# TYPE tradesim_fx_fetches_succeeded counter
tradesim_fx_fetches_succeeded {}

# HELP tradesim_fx_fetches_failed Rate provider fetches that failed
# TYPE tradesim_fx_fetches_failed counter
tradesim_fx_fetches_failed {}

# HELP tradesim_fx_coalesced_waits Requests that joined an in-flight fetch
# TYPE tradesim_fx_coalesced_waits counter
tradesim_fx_coalesced_waits {}

# HELP tradesim_fx_stale_served Requests served a stale table after a failed refresh
# TYPE tradesim_fx_stale_served counter
tradesim_fx_stale_served {}
"#,
            snapshot.cache_hits,
            snapshot.fetches_started,
            snapshot.fetches_succeeded,
            snapshot.fetches_failed,
            snapshot.coalesced_waits,
            snapshot.stale_served,
        )
    }
}

impl Default for RateStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub coalesced_waits: u64,
    pub stale_served: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<RateStoreMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = RateStoreMetrics::new();

        metrics.fetch_started();
        metrics.fetch_failed();
        metrics.stale_served();
        metrics.cache_hit();
        metrics.cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fetches_started, 1);
        assert_eq!(snapshot.fetches_failed, 1);
        assert_eq!(snapshot.stale_served, 1);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.fetches_succeeded, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = RateStoreMetrics::new();
        metrics.coalesced_wait();

        let output = metrics.to_prometheus();
        assert!(output.contains("tradesim_fx_coalesced_waits 1"));
        assert!(output.contains("tradesim_fx_cache_hits 0"));
    }
}
