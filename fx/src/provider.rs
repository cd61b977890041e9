//! Rate provider traits and implementations.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{FxError, FxResult};
use crate::table::RawRates;

/// Trait for exchange-rate sources.
///
/// A provider returns one complete table of rates relative to the pivot
/// currency. Validation happens in the store, not here.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the current rate table.
    async fn fetch_rates(&self) -> FxResult<RawRates>;
}

/// Provider that always serves the same rates.
#[derive(Debug, Clone)]
pub struct StaticRateProvider {
    rates: RawRates,
}

impl StaticRateProvider {
    /// Create a provider from a fixed table.
    pub fn new(rates: RawRates) -> Self {
        Self { rates }
    }

    /// Build from `CODE=RATE` strings, e.g. `["USD=0.012", "EUR=0.011"]`.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> FxResult<Self> {
        let mut rates = RawRates::new();
        for pair in pairs {
            let (code, rate) = pair.split_once('=').ok_or_else(|| {
                FxError::Configuration(format!("expected CODE=RATE, got {pair:?}"))
            })?;
            let rate: Decimal = rate.trim().parse().map_err(|e| {
                FxError::Configuration(format!("invalid rate for {}: {e}", code.trim()))
            })?;
            rates.insert(code.trim().to_string(), rate);
        }
        Ok(Self { rates })
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    fn name(&self) -> &str {
        "STATIC"
    }

    async fn fetch_rates(&self) -> FxResult<RawRates> {
        Ok(self.rates.clone())
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    response: parking_lot::Mutex<FxResult<RawRates>>,
    delay: parking_lot::Mutex<Option<std::time::Duration>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider serving `rates`.
    pub fn new(name: impl Into<String>, rates: RawRates) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(Ok(rates)),
            delay: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve `rates` from the next call on.
    pub fn set_rates(&self, rates: RawRates) {
        *self.response.lock() = Ok(rates);
    }

    /// Fail every call from now on.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.response.lock() = Err(FxError::RateFetch(reason.into()));
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> FxResult<RawRates> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.response.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_provider_from_pairs() {
        let provider = StaticRateProvider::from_pairs(["USD=0.012", " EUR = 0.011 "]).unwrap();
        let rates = provider.fetch_rates().await.unwrap();

        assert_eq!(provider.name(), "STATIC");
        assert_eq!(rates.get("USD"), Some(&dec!(0.012)));
        assert_eq!(rates.get("EUR"), Some(&dec!(0.011)));
    }

    #[test]
    fn test_static_provider_rejects_bad_pairs() {
        assert!(matches!(
            StaticRateProvider::from_pairs(["USD"]),
            Err(FxError::Configuration(_))
        ));
        assert!(matches!(
            StaticRateProvider::from_pairs(["USD=abc"]),
            Err(FxError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mut rates = RawRates::new();
        rates.insert("USD".into(), dec!(0.012));
        let provider = MockRateProvider::new("test", rates);

        assert!(provider.fetch_rates().await.is_ok());

        provider.fail_with("offline");
        assert!(matches!(
            provider.fetch_rates().await,
            Err(FxError::RateFetch(_))
        ));
        assert_eq!(provider.calls(), 2);
    }
}
