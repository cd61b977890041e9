//! FX configuration.

use std::time::Duration;

use tradesim_common::Currency;

use crate::cache::RateStoreConfig;

/// Top-level FX configuration.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// Rate provider endpoint. `None` means no HTTP provider is configured.
    pub endpoint: Option<String>,
    /// Rate store configuration.
    pub store: RateStoreConfig,
    /// Log level.
    pub log_level: String,
    /// Emit logs as JSON.
    pub json_logs: bool,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            store: RateStoreConfig::default(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("RATES_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.endpoint = Some(endpoint.trim().to_string());
            }
        }

        if let Some(pivot) = lookup("RATES_PIVOT") {
            config.store.pivot = Currency::new(pivot.trim());
        }

        if let Some(ttl) = lookup("RATES_TTL_SECS") {
            if let Ok(secs) = ttl.trim().parse() {
                config.store.ttl = Duration::from_secs(secs);
            }
        }

        if let Some(timeout) = lookup("RATES_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.trim().parse() {
                config.store.fetch_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(json) = lookup("LOG_JSON") {
            config.json_logs = matches!(json.trim(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.store.pivot.is_valid_code() {
            return Err(format!("Invalid pivot currency: {}", self.store.pivot));
        }

        if self.store.ttl.is_zero() {
            return Err("Rate cache TTL cannot be 0".to_string());
        }

        if self.store.fetch_timeout.is_zero() {
            return Err("Rate fetch timeout cannot be 0".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!("Rate endpoint must be an http(s) URL: {endpoint}"));
            }
        }

        Ok(())
    }
}
