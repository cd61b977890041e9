//! Pivot-currency conversion over the rate store.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{instrument, warn};
use tradesim_common::{Currency, Money};

use crate::cache::RateStore;
use crate::conversion::{ConversionRequest, DisplayAmount};
use crate::error::FxResult;
use crate::format::format_amount;

/// Converts and formats monetary amounts for display.
pub struct CurrencyConverter {
    store: Arc<RateStore>,
}

impl CurrencyConverter {
    /// Create a converter backed by `store`.
    pub fn new(store: Arc<RateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Same-currency requests return `amount` as-is without touching the
    /// store. Otherwise the amount goes through the store's pivot currency.
    /// Fails with `CurrencyNotSupported` for codes the table does not know.
    #[instrument(skip(self), fields(pivot = %self.store.pivot()))]
    pub async fn convert(&self, amount: Decimal, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(amount);
        }

        let table = self.store.get_rates().await?;
        table.convert(amount, from, to)
    }

    pub async fn convert_request(&self, request: &ConversionRequest) -> FxResult<Decimal> {
        self.convert(request.amount, &request.from, &request.to).await
    }

    /// Format `amount` in `currency` for `locale`. See [`format_amount`].
    pub fn format(&self, amount: Decimal, currency: &Currency, locale: &str) -> FxResult<String> {
        format_amount(amount, currency, locale)
    }

    /// Convert `money` into `preferred` and format it.
    ///
    /// When conversion is unavailable the native amount is formatted
    /// instead and flagged, so a page can still render. Only an invalid
    /// currency code in `money` itself is an error.
    pub async fn display(
        &self,
        money: &Money,
        preferred: &Currency,
        locale: &str,
    ) -> FxResult<DisplayAmount> {
        let converted = self.convert(money.value, &money.currency, preferred).await;
        self.display_result(money, preferred, locale, converted)
    }

    /// Format the outcome of converting `money` into `preferred`.
    ///
    /// Same fallback as [`display`](Self::display), for callers that already
    /// hold the conversion result and must not fetch again.
    pub fn display_result(
        &self,
        money: &Money,
        preferred: &Currency,
        locale: &str,
        converted: FxResult<Decimal>,
    ) -> FxResult<DisplayAmount> {
        match converted.and_then(|value| format_amount(value, preferred, locale)) {
            Ok(text) => Ok(DisplayAmount {
                text,
                currency: preferred.clone(),
                converted: true,
            }),
            Err(e) => {
                warn!(
                    error = %e,
                    amount = %money,
                    preferred = %preferred,
                    "Conversion unavailable, showing native amount"
                );
                Ok(DisplayAmount {
                    text: format_amount(money.value, &money.currency, locale)?,
                    currency: money.currency.clone(),
                    converted: false,
                })
            }
        }
    }
}
