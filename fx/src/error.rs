//! FX error types.

use rust_decimal::Decimal;
use thiserror::Error;
use tradesim_common::Currency;

/// Errors that can occur while fetching rates or converting amounts.
///
/// `Clone` so a single in-flight fetch can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    /// The rate provider could not be reached, answered with a non-200
    /// status, timed out, or returned a payload that failed validation.
    #[error("Rate fetch failed: {0}")]
    RateFetch(String),

    /// The currency is neither the pivot nor present in the rate table.
    #[error("Currency not supported: {0}")]
    CurrencyNotSupported(Currency),

    /// A currency code that is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// The converted amount does not fit in a decimal.
    #[error("Arithmetic overflow converting {amount} {from} to {to}")]
    ArithmeticOverflow {
        amount: Decimal,
        from: Currency,
        to: Currency,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Whether this error came from the provider side rather than the caller.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, FxError::RateFetch(_))
    }

    /// Stable code for logs and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::RateFetch(_) => "RATE_FETCH",
            FxError::CurrencyNotSupported(_) => "CURRENCY_NOT_SUPPORTED",
            FxError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            FxError::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
            FxError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
