//! Tradesim FX
//!
//! Exchange-rate caching and currency conversion for display.
//!
//! # Features
//!
//! - One rate table relative to a configurable pivot currency
//! - TTL cache that keeps serving its last good table when a refresh fails
//! - Single-flight refresh: concurrent callers share one provider fetch
//! - Locale-aware formatting of monetary amounts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tradesim_fx::{CurrencyConverter, HttpRateProvider, RateStore, RateStoreConfig};
//! use tradesim_common::Currency;
//!
//! let config = RateStoreConfig::default();
//! let provider = Arc::new(HttpRateProvider::new("https://rates.example.com", config.fetch_timeout)?);
//! let converter = CurrencyConverter::new(Arc::new(RateStore::new(provider, config)));
//!
//! let eur = converter.convert(amount, &Currency::inr(), &Currency::eur()).await?;
//! let text = converter.format(eur, &Currency::eur(), "de-DE")?;
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod converter;
pub mod error;
pub mod format;
pub mod http;
pub mod metrics;
pub mod provider;
pub mod table;

pub use cache::{CacheState, RateStore, RateStoreConfig};
pub use config::FxConfig;
pub use conversion::{ConversionRequest, DisplayAmount};
pub use converter::CurrencyConverter;
pub use error::{FxError, FxResult};
pub use format::format_amount;
pub use http::HttpRateProvider;
pub use metrics::{MetricsSnapshot, RateStoreMetrics};
pub use provider::{RateProvider, StaticRateProvider};
pub use table::{RateTable, RawRates};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
