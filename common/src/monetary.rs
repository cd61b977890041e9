//! Monetary types for tradesim.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value. Negative values represent debits.
    pub value: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create from a string value.
    pub fn from_str(value: &str, currency: Currency) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            value: value.parse()?,
            currency,
        })
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            value: self
                .value
                .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// A currency code that is not three ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code: {0:?}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code. The code is uppercased but not validated.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Parse and validate a currency code.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        let currency = Self::new(code.trim());
        if currency.is_valid_code() {
            Ok(currency)
        } else {
            Err(CurrencyCodeError(code.to_string()))
        }
    }

    /// Whether the code has the ISO 4217 shape (three ASCII letters).
    pub fn is_valid_code(&self) -> bool {
        self.0.len() == 3 && self.0.bytes().all(|b| b.is_ascii_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Display symbol, if the currency has a well-known one.
    pub fn symbol(&self) -> Option<&'static str> {
        match self.0.as_str() {
            "USD" => Some("$"),
            "EUR" => Some("€"),
            "GBP" => Some("£"),
            "INR" => Some("₹"),
            "JPY" => Some("¥"),
            "KRW" => Some("₩"),
            _ => None,
        }
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn inr() -> Self {
        Self::new("INR")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("usd").unwrap(), Currency::usd());
        assert_eq!(Currency::parse(" eur ").unwrap(), Currency::eur());
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("USDT").is_err());
        assert!(Currency::parse("U$D").is_err());
    }

    #[test]
    fn test_currency_new_is_unchecked() {
        let bogus = Currency::new("dollars");
        assert_eq!(bogus.code(), "DOLLARS");
        assert!(!bogus.is_valid_code());
    }

    #[test]
    fn test_currency_decimal_places() {
        assert_eq!(Currency::usd().decimal_places(), 2);
        assert_eq!(Currency::inr().decimal_places(), 2);
        assert_eq!(Currency::jpy().decimal_places(), 0);
        assert_eq!(Currency::new("KWD").decimal_places(), 3);
    }

    #[test]
    fn test_currency_symbol() {
        assert_eq!(Currency::inr().symbol(), Some("₹"));
        assert_eq!(Currency::new("CHF").symbol(), None);
    }

    #[test]
    fn test_money_round() {
        let m = Money::new(dec!(12.345), Currency::usd());
        assert_eq!(m.round().value, dec!(12.35));

        let debit = Money::new(dec!(-12.345), Currency::usd());
        assert_eq!(debit.round().value, dec!(-12.35));
        assert!(debit.is_negative());

        let yen = Money::new(dec!(1500.5), Currency::jpy());
        assert_eq!(yen.round().value, dec!(1501));
    }

    #[test]
    fn test_money_display() {
        let m = Money::from_str("1234.56", Currency::eur()).unwrap();
        assert_eq!(m.to_string(), "1234.56 EUR");
        assert_eq!(Money::zero(Currency::usd()).to_string(), "0 USD");
    }
}
