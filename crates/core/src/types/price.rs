//! Type-safe price representation using decimal arithmetic.
//!
//! Prices on the cart wire format are bare amounts (the store runs in a
//! single currency); the currency only matters when formatting for display.
//! Amounts are accepted as JSON strings or numbers. A parsed amount is
//! written back in the form it was read (`"20.00"`, `20` or `20.5`), so
//! storing a cart that was just loaded leaves the stored value unchanged.
//! Amounts built in code are written as strings.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A unit or line amount in the store currency.
///
/// Equality, ordering and hashing look at the amount only.
#[derive(Debug, Clone, Copy)]
pub struct Price {
    amount: Decimal,
    form: AmountForm,
}

/// JSON representation an amount arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountForm {
    Text,
    Integer,
    Float,
}

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self::new(Decimal::ZERO);

    /// Create a new price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self {
            amount,
            form: AmountForm::Text,
        }
    }

    /// Create a price from an amount in minor units (e.g., cents).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, 2))
    }

    /// Get the underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity))
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        format!("{}{:.2}", currency.symbol(), self.amount)
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount.cmp(&other.amount)
    }
}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.amount.hash(state);
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.amount + rhs.amount)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.form {
            AmountForm::Integer => {
                if let Some(value) = self.amount.to_i64() {
                    return serializer.serialize_i64(value);
                }
            }
            AmountForm::Float => {
                // Parse the decimal text so the float is the nearest one to it.
                if let Ok(value) = self.amount.to_string().parse::<f64>() {
                    return serializer.serialize_f64(value);
                }
            }
            AmountForm::Text => {}
        }
        serializer.collect_str(&self.amount)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}

struct PriceVisitor;

impl PriceVisitor {
    fn parse<E: de::Error>(raw: &str, form: AmountForm) -> Result<Price, E> {
        Decimal::from_str(raw.trim())
            .map(|amount| Price { amount, form })
            .map_err(|e| E::custom(format!("invalid amount '{raw}': {e}")))
    }
}

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        Self::parse(v, AmountForm::Text)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        Ok(Price {
            amount: Decimal::from(v),
            form: AmountForm::Integer,
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        Ok(Price {
            amount: Decimal::from(v),
            form: AmountForm::Integer,
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        // Display gives the shortest decimal that reads back as `v`.
        Self::parse(&v.to_string(), AmountForm::Float)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_accepts_number_and_string() {
        let from_number: Price = serde_json::from_str("19.99").unwrap();
        let from_string: Price = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, Price::from_cents(1999));
    }

    #[test]
    fn test_price_is_written_in_the_form_it_was_read() {
        for raw in ["\"20.00\"", "20", "20.5", "19.99", "20.0"] {
            let price: Price = serde_json::from_str(raw).unwrap();
            let written = serde_json::to_value(price).unwrap();
            let original: serde_json::Value = serde_json::from_str(raw).unwrap();
            assert_eq!(written, original, "{raw} was rewritten");
        }
    }

    #[test]
    fn test_equality_ignores_wire_form() {
        let from_number: Price = serde_json::from_str("20").unwrap();
        let from_string: Price = serde_json::from_str("\"20.00\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, Price::from_cents(2000));
    }

    #[test]
    fn test_computed_price_is_written_as_string() {
        let unit: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(serde_json::to_string(&unit.times(2)).unwrap(), "\"25.0\"");
    }

    #[test]
    fn test_price_times_and_sum() {
        let unit = Price::from_cents(250);
        let total: Price = [unit.times(2), Price::from_cents(100)].into_iter().sum();
        assert_eq!(total, Price::from_cents(600));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(1999).display(CurrencyCode::USD), "$19.99");
        assert_eq!(Price::from_cents(500).display(CurrencyCode::GBP), "£5.00");
    }
}
