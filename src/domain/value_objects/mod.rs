//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 4217 currency code, stored lowercase the way payment processors expect it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    pub fn new(value: impl Into<String>) -> Result<Self, MoneyError> {
        let value = value.into().trim().to_lowercase();
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(value));
        }
        Ok(Self(value))
    }
    pub fn eur() -> Self { Self("eur".to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for Currency { fn default() -> Self { Self::eur() } }

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: Currency }

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self { Self { amount, currency } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &Currency { &self.currency }

    /// Amount in the processor's minor unit (cents), rounded half away from zero.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative(self.amount));
        }
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::Overflow(self.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoneyError {
    #[error("invalid currency code {0:?}")]
    InvalidCurrency(String),
    #[error("negative amount {0}")]
    Negative(Decimal),
    #[error("amount {0} does not fit in minor units")]
    Overflow(Decimal),
}

/// Sum of `price × quantity` over priced line items.
pub fn line_total(lines: impl IntoIterator<Item = (Decimal, u32)>) -> Decimal {
    lines.into_iter().fold(Decimal::ZERO, |acc, (price, qty)| acc + price * Decimal::from(qty))
}
