//! Portfolio view rendered in the user's preferred currency.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};
use tradesim_common::{Currency, Money};
use tradesim_fx::{CurrencyConverter, DisplayAmount, FxResult};

/// One position held in its native currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding(pub Money);

impl FromStr for Holding {
    type Err = String;

    /// Parse `AMOUNT:CODE`, e.g. `1234.56:INR` or `-20:USD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, code) = s
            .split_once(':')
            .ok_or_else(|| format!("expected AMOUNT:CURRENCY, got {s:?}"))?;

        let currency = Currency::parse(code).map_err(|e| e.to_string())?;
        let money = Money::from_str(amount.trim(), currency)
            .map_err(|e| format!("invalid amount {:?}: {e}", amount.trim()))?;

        Ok(Holding(money))
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portfolio shown when no holdings are given.
pub fn default_portfolio() -> Vec<Holding> {
    vec![
        Holding(Money::new(Decimal::new(25_000_000, 2), Currency::inr())),
        Holding(Money::new(Decimal::new(125_000, 2), Currency::usd())),
        Holding(Money::new(Decimal::new(-43_075, 2), Currency::eur())),
    ]
}

/// Result of one render pass.
#[derive(Debug, Clone)]
pub struct RenderPass {
    pub lines: Vec<(Holding, DisplayAmount)>,
    /// Portfolio total in the preferred currency, if every holding converted.
    pub total: Option<DisplayAmount>,
}

impl RenderPass {
    pub fn fallback_count(&self) -> usize {
        self.lines.iter().filter(|(_, shown)| shown.is_fallback()).count()
    }
}

/// Renders holdings for one user.
pub struct Dashboard {
    converter: Arc<CurrencyConverter>,
    preferred: Currency,
    locale: String,
    holdings: Vec<Holding>,
}

impl Dashboard {
    pub fn new(
        converter: Arc<CurrencyConverter>,
        preferred: Currency,
        locale: impl Into<String>,
        holdings: Vec<Holding>,
    ) -> Self {
        Self {
            converter,
            preferred,
            locale: locale.into(),
            holdings,
        }
    }

    /// Format every holding, and the total when all of them convert.
    pub async fn render(&self) -> FxResult<RenderPass> {
        let mut lines = Vec::with_capacity(self.holdings.len());
        let mut total = Some(Decimal::ZERO);

        for holding in &self.holdings {
            let money = &holding.0;
            let converted = self
                .converter
                .convert(money.value, &money.currency, &self.preferred)
                .await;

            total = match (&converted, total) {
                (Ok(value), Some(sum)) => sum.checked_add(*value),
                _ => None,
            };

            let shown = self
                .converter
                .display_result(money, &self.preferred, &self.locale, converted)?;

            lines.push((holding.clone(), shown));
        }

        let total = match total {
            Some(sum) => Some(DisplayAmount {
                text: self.converter.format(sum, &self.preferred, &self.locale)?,
                currency: self.preferred.clone(),
                converted: true,
            }),
            None => {
                warn!(preferred = %self.preferred, "Portfolio total unavailable");
                None
            }
        };

        debug!(lines = lines.len(), "Rendered dashboard");
        Ok(RenderPass { lines, total })
    }
}
