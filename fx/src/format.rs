//! Locale-aware display of monetary amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use tradesim_common::Currency;

use crate::error::{FxError, FxResult};

const NBSP: char = '\u{a0}';
const NARROW_NBSP: char = '\u{202f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    /// Groups of three: 1,234,567
    Thousands,
    /// Last three, then twos: 12,34,567
    Indian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolPosition {
    Prefix,
    /// After the number, separated by a no-break space.
    Suffix,
}

/// Number and currency conventions for one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleFormat {
    group: char,
    decimal: char,
    grouping: Grouping,
    position: SymbolPosition,
}

impl LocaleFormat {
    const EN: Self = Self {
        group: ',',
        decimal: '.',
        grouping: Grouping::Thousands,
        position: SymbolPosition::Prefix,
    };

    const EN_IN: Self = Self {
        grouping: Grouping::Indian,
        ..Self::EN
    };

    const DE: Self = Self {
        group: '.',
        decimal: ',',
        grouping: Grouping::Thousands,
        position: SymbolPosition::Suffix,
    };

    const FR: Self = Self {
        group: NARROW_NBSP,
        decimal: ',',
        grouping: Grouping::Thousands,
        position: SymbolPosition::Suffix,
    };

    /// Resolve a BCP 47-style tag (`en-US`, `de_DE`, `fr`). Unknown tags get en-US.
    pub fn for_locale(locale: &str) -> Self {
        let normalized = locale.trim().replace('_', "-").to_ascii_lowercase();
        let mut parts = normalized.split('-');
        let language = parts.next().unwrap_or_default();
        let region = parts.next().unwrap_or_default();

        match (language, region) {
            ("en", "in") | ("hi", _) => Self::EN_IN,
            ("de", _) => Self::DE,
            ("fr", _) => Self::FR,
            _ => Self::EN,
        }
    }

    fn group_digits(&self, digits: &str) -> String {
        let len = digits.len();
        let mut out = String::with_capacity(len + len / 2);

        for (i, ch) in digits.chars().enumerate() {
            let remaining = len - i;
            if i > 0 && self.is_group_boundary(remaining) {
                out.push(self.group);
            }
            out.push(ch);
        }
        out
    }

    /// Whether a separator goes before a digit with `remaining` digits left (itself included).
    fn is_group_boundary(&self, remaining: usize) -> bool {
        match self.grouping {
            Grouping::Thousands => remaining % 3 == 0,
            Grouping::Indian => remaining == 3 || (remaining > 3 && (remaining - 3) % 2 == 0),
        }
    }
}

/// Format `amount` for display in `currency` under `locale`.
///
/// Rounds to the currency's minor units (two places for most currencies).
/// Fails only when `currency` is not a three-letter code.
pub fn format_amount(amount: Decimal, currency: &Currency, locale: &str) -> FxResult<String> {
    if !currency.is_valid_code() {
        return Err(FxError::InvalidCurrencyCode(currency.code().to_string()));
    }

    let format = LocaleFormat::for_locale(locale);
    let places = currency.decimal_places();
    let rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();

    let fixed = format!("{:.*}", places as usize, rounded.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let mut number = format.group_digits(int_part);
    if let Some(frac) = frac_part {
        number.push(format.decimal);
        number.push_str(frac);
    }

    let sign = if negative { "-" } else { "" };
    let text = match (format.position, currency.symbol()) {
        (SymbolPosition::Prefix, Some(symbol)) => format!("{sign}{symbol}{number}"),
        (SymbolPosition::Prefix, None) => format!("{sign}{}{NBSP}{number}", currency.code()),
        (SymbolPosition::Suffix, symbol) => {
            format!("{sign}{number}{NBSP}{}", symbol.unwrap_or(currency.code()))
        }
    };

    Ok(text)
}
