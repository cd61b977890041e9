//! Conversion request and display types.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradesim_common::{Currency, Money};

/// Request to convert an amount between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Amount to convert; may be zero or negative.
    pub amount: Decimal,
    /// Currency the amount is in.
    pub from: Currency,
    /// Currency to convert into.
    pub to: Currency,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(amount: Decimal, from: Currency, to: Currency) -> Self {
        Self { amount, from, to }
    }

    /// Request converting `money` into `to`.
    pub fn for_money(money: &Money, to: Currency) -> Self {
        Self::new(money.value, money.currency.clone(), to)
    }

    /// Whether source and target are the same currency.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

/// A formatted amount ready to show, and whether it was converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAmount {
    /// Locale-formatted text.
    pub text: String,
    /// Currency the text is in.
    pub currency: Currency,
    /// False when conversion was unavailable and the native amount is shown.
    pub converted: bool,
}

impl DisplayAmount {
    pub fn is_fallback(&self) -> bool {
        !self.converted
    }
}

impl fmt::Display for DisplayAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.converted {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{} (conversion unavailable)", self.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_for_money() {
        let money = Money::new(dec!(-25.50), Currency::usd());
        let request = ConversionRequest::for_money(&money, Currency::eur());

        assert_eq!(request.amount, dec!(-25.50));
        assert_eq!(request.from, Currency::usd());
        assert_eq!(request.to, Currency::eur());
        assert!(!request.is_identity());
    }

    #[test]
    fn test_display_amount_marks_fallback() {
        let converted = DisplayAmount {
            text: "€11.00".into(),
            currency: Currency::eur(),
            converted: true,
        };
        assert_eq!(converted.to_string(), "€11.00");

        let fallback = DisplayAmount {
            text: "$12.00".into(),
            currency: Currency::usd(),
            converted: false,
        };
        assert!(fallback.is_fallback());
        assert_eq!(fallback.to_string(), "$12.00 (conversion unavailable)");
    }
}
