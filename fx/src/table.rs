//! Pivot-relative exchange rate table.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;
use tradesim_common::Currency;

use crate::error::{FxError, FxResult};

/// Rates as they arrive from a provider, before validation.
pub type RawRates = HashMap<String, Decimal>;

/// Exchange rates for a set of currencies, all relative to one pivot.
///
/// `rates[c]` is how many units of `c` one unit of the pivot buys. The
/// pivot itself is never stored; its rate is 1 by definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pivot: Currency,
    rates: HashMap<Currency, Decimal>,
}

impl RateTable {
    /// Validate a provider payload into a table.
    ///
    /// The whole payload is rejected if it is empty, or if any entry has a
    /// malformed code or a rate that is not strictly positive. A code that
    /// appears twice once normalized, or a pivot entry whose rate is not
    /// exactly 1, also rejects it: the payload is ambiguous or quoted
    /// against some other base.
    pub fn from_raw(pivot: Currency, raw: RawRates) -> FxResult<Self> {
        if raw.is_empty() {
            return Err(FxError::RateFetch("provider returned an empty rate table".into()));
        }

        let mut rates = HashMap::with_capacity(raw.len());
        for (code, rate) in raw {
            let currency = Currency::parse(&code).map_err(|e| {
                FxError::RateFetch(format!("payload rejected: {e}"))
            })?;

            if rate <= Decimal::ZERO {
                return Err(FxError::RateFetch(format!(
                    "payload rejected: non-positive rate {rate} for {currency}"
                )));
            }

            if currency == pivot {
                if rate != Decimal::ONE {
                    return Err(FxError::RateFetch(format!(
                        "payload rejected: pivot {pivot} quoted at {rate}, expected 1"
                    )));
                }
                debug!(pivot = %pivot, "Dropping pivot entry from payload");
                continue;
            }

            if rates.insert(currency.clone(), rate).is_some() {
                return Err(FxError::RateFetch(format!(
                    "payload rejected: duplicate rate for {currency}"
                )));
            }
        }

        Ok(Self { pivot, rates })
    }

    /// The currency every rate is expressed against.
    pub fn pivot(&self) -> &Currency {
        &self.pivot
    }

    /// Rate for `currency` relative to the pivot.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        if *currency == self.pivot {
            return Some(Decimal::ONE);
        }
        self.rates.get(currency).copied()
    }

    /// Whether `currency` can be converted to or from.
    pub fn supports(&self, currency: &Currency) -> bool {
        self.rate(currency).is_some()
    }

    /// All convertible currencies, pivot included, sorted by code.
    pub fn currencies(&self) -> Vec<Currency> {
        let mut all: Vec<Currency> = self.rates.keys().cloned().collect();
        all.push(self.pivot.clone());
        all.sort();
        all
    }

    /// Number of non-pivot rates.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Convert `amount` from one currency to another through the pivot.
    ///
    /// One division takes the amount into the pivot, one multiplication
    /// takes it out. Identical currencies return `amount` untouched.
    pub fn convert(&self, amount: Decimal, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if from == to {
            return Ok(amount);
        }

        let overflow = || FxError::ArithmeticOverflow {
            amount,
            from: from.clone(),
            to: to.clone(),
        };

        let in_pivot = if *from == self.pivot {
            amount
        } else {
            let rate = self
                .rates
                .get(from)
                .ok_or_else(|| FxError::CurrencyNotSupported(from.clone()))?;
            amount.checked_div(*rate).ok_or_else(overflow)?
        };

        if *to == self.pivot {
            return Ok(in_pivot);
        }

        let rate = self
            .rates
            .get(to)
            .ok_or_else(|| FxError::CurrencyNotSupported(to.clone()))?;
        in_pivot.checked_mul(*rate).ok_or_else(overflow)
    }
}
