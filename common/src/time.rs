//! Time utilities and constants for tradesim.

use chrono::{DateTime, Duration, Utc};

/// FX timing constants.
pub mod constants {
    /// How long a fetched rate table is served without refetching (5 minutes).
    pub fn rate_cache_ttl() -> std::time::Duration {
        std::time::Duration::from_secs(5 * 60)
    }

    /// Upper bound on a single rate fetch (10 seconds).
    pub fn rate_fetch_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(10)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Age of `since` relative to `now`, clamped at zero.
pub fn age(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let elapsed = now.signed_duration_since(since);
    if elapsed < Duration::zero() {
        Duration::zero()
    } else {
        elapsed
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
