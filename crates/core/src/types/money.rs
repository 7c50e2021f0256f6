//! Money representation using decimal arithmetic.
//!
//! Prices are stored as `NUMERIC(10,2)` and handled as [`Decimal`] everywhere
//! in the application. The payment provider expects integer minor units
//! (cents), so conversion happens only at that boundary.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Build an amount from integer minor units (e.g., cents).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency,
        }
    }

    /// Amount in integer minor units, rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format_amount(self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Format a bare decimal amount with a currency symbol and two decimals.
#[must_use]
pub fn format_amount(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}{:.2}", currency.symbol(), rounded.abs())
    } else {
        format!("{}{:.2}", currency.symbol(), rounded)
    }
}

/// ISO 4217 currency codes supported by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    pub const ALL: [Self; 5] = [Self::USD, Self::EUR, Self::GBP, Self::CAD, Self::AUD];

    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Lower-case ISO code, as expected by the payment provider.
    #[must_use]
    pub fn provider_code(&self) -> String {
        self.code().to_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_two_decimals() {
        let price = Money::new(Decimal::new(125, 1), CurrencyCode::USD);
        assert_eq!(price.display(), "$12.50");
        assert_eq!(Money::zero(CurrencyCode::GBP).display(), "£0.00");
    }

    #[test]
    fn test_display_negative() {
        assert_eq!(format_amount(Decimal::new(-500, 2), CurrencyCode::USD), "-$5.00");
    }

    #[test]
    fn test_minor_units() {
        let price = Money::new(Decimal::new(1999, 2), CurrencyCode::USD);
        assert_eq!(price.to_minor_units(), Some(1999));

        let price = Money::new(Decimal::new(10_005, 3), CurrencyCode::USD);
        assert_eq!(price.to_minor_units(), Some(1001));

        let price = Money::from_minor_units(250, CurrencyCode::EUR);
        assert_eq!(price.amount, Decimal::new(250, 2));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert!("xyz".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::EUR.provider_code(), "eur");
    }
}
