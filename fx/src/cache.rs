//! Exchange-rate store with TTL, single-flight refresh and serve-stale-on-error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use tradesim_common::time::{age, constants};
use tradesim_common::{Clock, Currency, SystemClock};

use crate::error::{FxError, FxResult};
use crate::metrics::{RateStoreMetrics, SharedMetrics};
use crate::provider::RateProvider;
use crate::table::RateTable;

/// Configuration for the rate store.
#[derive(Debug, Clone)]
pub struct RateStoreConfig {
    /// Currency all rates are expressed against.
    pub pivot: Currency,
    /// How long a fetched table is served without refetching.
    pub ttl: Duration,
    /// Upper bound on a single provider fetch.
    pub fetch_timeout: Duration,
}

impl Default for RateStoreConfig {
    fn default() -> Self {
        Self {
            pivot: Currency::inr(),
            ttl: constants::rate_cache_ttl(),
            fetch_timeout: constants::rate_fetch_timeout(),
        }
    }
}

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing fetched yet, or the cache was invalidated.
    Empty,
    /// The table is younger than the TTL.
    Fresh,
    /// The table is older than the TTL; the next request refetches.
    Stale,
}

/// A fetched table and when it was fetched. Never mutated after creation.
#[derive(Debug)]
pub struct CacheEntry {
    pub table: Arc<RateTable>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(table: Arc<RateTable>, fetched_at: DateTime<Utc>) -> Self {
        Self { table, fetched_at }
    }

    /// Fresh while `now - fetched_at < ttl`. A timestamp in the future counts as age zero.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        age(self.fetched_at, now).to_std().unwrap_or_default() < ttl
    }
}

type InflightFetch = Shared<BoxFuture<'static, FxResult<Arc<RateTable>>>>;

struct StoreState {
    provider: Arc<dyn RateProvider>,
    clock: Arc<dyn Clock>,
    config: RateStoreConfig,
    current: RwLock<Option<Arc<CacheEntry>>>,
    inflight: Mutex<Option<InflightFetch>>,
    metrics: SharedMetrics,
}

impl StoreState {
    fn current_entry(&self) -> Option<Arc<CacheEntry>> {
        self.current.read().clone()
    }

    fn fresh_table(&self) -> Option<Arc<RateTable>> {
        let entry = self.current_entry()?;
        if entry.is_fresh(self.clock.now(), self.config.ttl) {
            Some(entry.table.clone())
        } else {
            None
        }
    }
}

enum Refresh {
    Fresh(Arc<RateTable>),
    Pending(InflightFetch),
}

/// Process-wide holder of the current rate table.
///
/// Concurrent callers that find the table stale share one provider fetch.
/// A successful fetch swaps in a whole new entry; a failed one leaves the
/// previous entry in place and it keeps being served.
pub struct RateStore {
    state: Arc<StoreState>,
}

impl RateStore {
    /// Create a store that ages entries against the system clock.
    pub fn new(provider: Arc<dyn RateProvider>, config: RateStoreConfig) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(
        provider: Arc<dyn RateProvider>,
        config: RateStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(StoreState {
                provider,
                clock,
                config,
                current: RwLock::new(None),
                inflight: Mutex::new(None),
                metrics: Arc::new(RateStoreMetrics::new()),
            }),
        }
    }

    /// Get a recent rate table, fetching if the cache is empty or stale.
    ///
    /// Fails only when the fetch fails and no earlier table exists.
    pub async fn get_rates(&self) -> FxResult<Arc<RateTable>> {
        if let Some(table) = self.state.fresh_table() {
            debug!("Rate cache hit");
            self.state.metrics.cache_hit();
            return Ok(table);
        }

        let fetch = match self.refresh() {
            Refresh::Fresh(table) => return Ok(table),
            Refresh::Pending(fetch) => fetch,
        };

        match fetch.await {
            Ok(table) => Ok(table),
            Err(err) => match self.state.current_entry() {
                Some(entry) => {
                    self.state.metrics.stale_served();
                    warn!(
                        error = %err,
                        fetched_at = %entry.fetched_at,
                        "Serving stale rate table"
                    );
                    Ok(entry.table.clone())
                }
                None => Err(err),
            },
        }
    }

    /// Join the fetch in flight, or start one.
    fn refresh(&self) -> Refresh {
        let mut slot = self.state.inflight.lock();

        if let Some(fetch) = slot.as_ref() {
            debug!("Joining in-flight rate fetch");
            self.state.metrics.coalesced_wait();
            return Refresh::Pending(fetch.clone());
        }

        // A fetch may have completed between the first check and taking the slot.
        if let Some(table) = self.state.fresh_table() {
            self.state.metrics.cache_hit();
            return Refresh::Fresh(table);
        }

        debug!("Rate cache miss, starting fetch");
        let fetch = start_fetch(&self.state);
        *slot = Some(fetch.clone());
        Refresh::Pending(fetch)
    }

    /// Drop the cached table. The next request fetches and has no fallback.
    pub fn invalidate(&self) {
        *self.state.current.write() = None;
        info!("Rate cache invalidated");
    }

    /// Current cache state.
    pub fn state(&self) -> CacheState {
        match self.state.current_entry() {
            None => CacheState::Empty,
            Some(entry) if entry.is_fresh(self.state.clock.now(), self.state.config.ttl) => {
                CacheState::Fresh
            }
            Some(_) => CacheState::Stale,
        }
    }

    /// The cached table, fresh or not, without fetching.
    pub fn cached(&self) -> Option<Arc<RateTable>> {
        self.state.current_entry().map(|entry| entry.table.clone())
    }

    /// When the cached table was fetched.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.state.current_entry().map(|entry| entry.fetched_at)
    }

    pub fn pivot(&self) -> &Currency {
        &self.state.config.pivot
    }

    pub fn config(&self) -> &RateStoreConfig {
        &self.state.config
    }

    pub fn provider_name(&self) -> &str {
        self.state.provider.name()
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.state.metrics.clone()
    }
}

/// Build the shared fetch future. It installs its own result and clears the
/// in-flight slot, so that happens once no matter how many callers wait.
fn start_fetch(state: &Arc<StoreState>) -> InflightFetch {
    let store = Arc::downgrade(state);
    let provider = state.provider.clone();
    let clock = state.clock.clone();
    let metrics = state.metrics.clone();
    let config = state.config.clone();

    async move {
        let outcome = fetch_table(provider.as_ref(), &config, &metrics)
            .await
            .map(Arc::new);

        if let Some(state) = store.upgrade() {
            if let Ok(table) = &outcome {
                let entry = CacheEntry::new(table.clone(), clock.now());
                *state.current.write() = Some(Arc::new(entry));
            }
            state.inflight.lock().take();
        }

        outcome
    }
    .boxed()
    .shared()
}

#[instrument(skip_all, fields(provider = provider.name(), pivot = %config.pivot))]
async fn fetch_table(
    provider: &dyn RateProvider,
    config: &RateStoreConfig,
    metrics: &RateStoreMetrics,
) -> FxResult<RateTable> {
    metrics.fetch_started();
    let started = Instant::now();

    let result = match tokio::time::timeout(config.fetch_timeout, provider.fetch_rates()).await {
        Ok(fetched) => fetched.and_then(|raw| RateTable::from_raw(config.pivot.clone(), raw)),
        Err(_) => Err(FxError::RateFetch(format!(
            "{} did not answer within {:?}",
            provider.name(),
            config.fetch_timeout
        ))),
    };

    match &result {
        Ok(table) => {
            metrics.fetch_succeeded();
            info!(
                currencies = table.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Rate table refreshed"
            );
        }
        Err(e) => {
            metrics.fetch_failed();
            warn!(error = %e, code = e.error_code(), "Rate table refresh failed");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockRateProvider;
    use crate::table::RawRates;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tradesim_common::ManualClock;

    fn rates(usd: Decimal, eur: Decimal) -> RawRates {
        let mut rates = RawRates::new();
        rates.insert("USD".into(), usd);
        rates.insert("EUR".into(), eur);
        rates
    }

    fn setup() -> (Arc<MockRateProvider>, Arc<ManualClock>, RateStore) {
        let provider = Arc::new(MockRateProvider::new("test", rates(dec!(0.012), dec!(0.011))));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = RateStore::with_clock(provider.clone(), RateStoreConfig::default(), clock.clone());
        (provider, clock, store)
    }

    fn ttl() -> chrono::Duration {
        chrono::Duration::from_std(constants::rate_cache_ttl()).unwrap()
    }

    #[tokio::test]
    async fn test_first_request_fetches() {
        let (provider, _clock, store) = setup();
        assert_eq!(store.state(), CacheState::Empty);

        let table = store.get_rates().await.unwrap();

        assert_eq!(table.rate(&Currency::usd()), Some(dec!(0.012)));
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_cache_hit() {
        let (provider, _clock, store) = setup();

        let first = store.get_rates().await.unwrap();
        let second = store.get_rates().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.metrics().snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let (provider, clock, store) = setup();
        store.get_rates().await.unwrap();

        clock.advance(ttl() - chrono::Duration::milliseconds(1));
        store.get_rates().await.unwrap();
        assert_eq!(provider.calls(), 1);

        clock.advance(chrono::Duration::milliseconds(2));
        assert_eq!(store.state(), CacheState::Stale);
        store.get_rates().await.unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(store.state(), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_refresh_replaces_table() {
        let (provider, clock, store) = setup();
        let old = store.get_rates().await.unwrap();

        provider.set_rates(rates(dec!(0.013), dec!(0.010)));
        clock.advance(ttl() + chrono::Duration::seconds(1));

        let new = store.get_rates().await.unwrap();
        assert_eq!(new.rate(&Currency::usd()), Some(dec!(0.013)));
        assert_eq!(old.rate(&Currency::usd()), Some(dec!(0.012)));
    }

    #[tokio::test]
    async fn test_serve_stale_on_error() {
        let (provider, clock, store) = setup();
        let fresh = store.get_rates().await.unwrap();

        provider.fail_with("provider down");
        clock.advance(ttl() + chrono::Duration::seconds(1));

        let served = store.get_rates().await.unwrap();
        assert!(Arc::ptr_eq(&fresh, &served));
        assert_eq!(provider.calls(), 2);
        assert_eq!(store.state(), CacheState::Stale);

        // Still stale, so every request keeps retrying.
        store.get_rates().await.unwrap();
        assert_eq!(provider.calls(), 3);

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.stale_served, 2);
        assert_eq!(snapshot.fetches_failed, 2);
    }

    #[tokio::test]
    async fn test_cold_start_failure() {
        let (provider, _clock, store) = setup();
        provider.fail_with("provider down");

        let result = store.get_rates().await;

        assert!(matches!(result, Err(FxError::RateFetch(_))));
        assert_eq!(store.state(), CacheState::Empty);
    }

    #[tokio::test]
    async fn test_invalid_payload_keeps_previous_table() {
        let (provider, clock, store) = setup();
        store.get_rates().await.unwrap();

        provider.set_rates(rates(dec!(0.013), dec!(-1)));
        clock.advance(ttl() + chrono::Duration::seconds(1));

        let served = store.get_rates().await.unwrap();
        assert_eq!(served.rate(&Currency::usd()), Some(dec!(0.012)));
        assert_eq!(store.metrics().snapshot().fetches_failed, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (provider, _clock, store) = setup();
        store.get_rates().await.unwrap();

        store.invalidate();
        assert_eq!(store.state(), CacheState::Empty);
        assert!(store.cached().is_none());

        store.get_rates().await.unwrap();
        assert_eq!(provider.calls(), 2);

        // Nothing to fall back on after invalidation.
        store.invalidate();
        provider.fail_with("provider down");
        assert!(store.get_rates().await.is_err());
    }

    #[tokio::test]
    async fn test_clock_moving_backwards_counts_as_fresh() {
        let (provider, clock, store) = setup();
        store.get_rates().await.unwrap();

        clock.advance(chrono::Duration::minutes(-10));
        store.get_rates().await.unwrap();

        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let provider = Arc::new(MockRateProvider::new("slow", rates(dec!(0.012), dec!(0.011))));
        provider.set_delay(Duration::from_millis(200));
        let config = RateStoreConfig {
            fetch_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let store = RateStore::new(provider.clone(), config);

        let result = store.get_rates().await;

        assert!(matches!(result, Err(FxError::RateFetch(_))));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let provider = Arc::new(MockRateProvider::new("test", rates(dec!(0.012), dec!(0.011))));
        provider.set_delay(Duration::from_millis(50));
        let store = Arc::new(RateStore::new(provider.clone(), RateStoreConfig::default()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_rates().await })
            })
            .collect();

        let mut tables = Vec::new();
        for handle in handles {
            tables.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(provider.calls(), 1);
        assert!(tables.iter().all(|t| Arc::ptr_eq(t, &tables[0])));
        assert_eq!(store.metrics().snapshot().fetches_started, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_failure() {
        let provider = Arc::new(MockRateProvider::new("test", RawRates::new()));
        provider.fail_with("provider down");
        provider.set_delay(Duration::from_millis(50));
        let store = Arc::new(RateStore::new(provider.clone(), RateStoreConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_rates().await })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(FxError::RateFetch(_))));
        }
        assert_eq!(provider.calls(), 1);

        // The failed fetch cleared its slot, so the next request tries again.
        assert!(store.get_rates().await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_stale_requests_share_one_refresh() {
        let (provider, clock, store) = setup();
        let store = Arc::new(store);
        let previous = store.get_rates().await.unwrap();

        provider.fail_with("provider down");
        provider.set_delay(Duration::from_millis(50));
        clock.advance(ttl() + chrono::Duration::seconds(1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_rates().await })
            })
            .collect();

        for handle in handles {
            let served = handle.await.unwrap().unwrap();
            assert!(Arc::ptr_eq(&served, &previous));
        }

        assert_eq!(provider.calls(), 2);
        assert_eq!(store.state(), CacheState::Stale);

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.stale_served, 8);
        assert_eq!(snapshot.fetches_failed, 1);
    }
}
