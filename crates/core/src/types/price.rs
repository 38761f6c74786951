//! Type-safe price representation using decimal arithmetic.
//!
//! Products carry a list price and an optional percentage discount. The price
//! a shopper pays per unit is always derived from those two values at the
//! moment it is displayed or ordered; it is never trusted from the client.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A price in the default currency.
    #[must_use]
    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::USD)
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Apply an optional percentage discount, rounding to cents.
    ///
    /// ```
    /// use marigold_core::{Discount, Price};
    /// use rust_decimal::Decimal;
    ///
    /// let list = Price::usd(Decimal::new(2000, 2));
    /// let discount = Discount::new(Decimal::new(25, 0)).unwrap();
    /// assert_eq!(list.discounted(Some(discount)).amount, Decimal::new(1500, 2));
    /// assert_eq!(list.discounted(None), list);
    /// ```
    #[must_use]
    pub fn discounted(self, discount: Option<Discount>) -> Self {
        let Some(discount) = discount else {
            return self;
        };
        let factor = (Decimal::ONE_HUNDRED - discount.percent()) / Decimal::ONE_HUNDRED;
        Self::new(round_cents(self.amount * factor), self.currency_code)
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Self {
        Self::new(
            round_cents(self.amount * Decimal::from(quantity.get())),
            self.currency_code,
        )
    }

    /// Add two prices in the same currency.
    ///
    /// Returns `None` when the currencies differ.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.currency_code != other.currency_code {
            return None;
        }
        Some(Self::new(self.amount + other.amount, self.currency_code))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            round_cents(self.amount)
        )
    }
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
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
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

/// Errors that can occur when building a [`Discount`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage outside 0..=100.
    #[error("discount must be between 0 and 100 percent (got {0})")]
    OutOfRange(Decimal),
}

/// A percentage discount in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Discount(Decimal);

impl Discount {
    /// Create a discount from a percentage.
    ///
    /// # Errors
    ///
    /// Returns `DiscountError::OutOfRange` for negative values or values above 100.
    pub fn new(percent: Decimal) -> Result<Self, DiscountError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DiscountError::OutOfRange(percent));
        }
        Ok(Self(percent))
    }

    /// The percentage value.
    #[must_use]
    pub const fn percent(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Discount {
    type Error = DiscountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Discount> for Decimal {
    fn from(discount: Discount) -> Self {
        discount.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dollars(cents: i64) -> Price {
        Price::usd(Decimal::new(cents, 2))
    }

    #[test]
    fn test_discount_rounds_half_away_from_zero() {
        // 9.99 * 0.85 = 8.4915 -> 8.49
        let pct = Discount::new(Decimal::new(15, 0)).unwrap();
        assert_eq!(dollars(999).discounted(Some(pct)), dollars(849));

        // 0.05 * 0.5 = 0.025 -> 0.03
        let half = Discount::new(Decimal::new(50, 0)).unwrap();
        assert_eq!(dollars(5).discounted(Some(half)), dollars(3));
    }

    #[test]
    fn test_full_discount_is_free() {
        let all = Discount::new(Decimal::ONE_HUNDRED).unwrap();
        assert_eq!(dollars(1234).discounted(Some(all)).amount, Decimal::ZERO);
    }

    #[test]
    fn test_discount_range() {
        assert!(Discount::new(Decimal::new(-1, 0)).is_err());
        assert!(Discount::new(Decimal::new(101, 0)).is_err());
        assert!(Discount::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_discount_deserialize_validates() {
        assert!(serde_json::from_str::<Discount>("\"150\"").is_err());
        let d: Discount = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(d.percent(), Decimal::new(125, 1));
    }

    #[test]
    fn test_times_and_sum() {
        let line = dollars(250).times(Quantity::new(3).unwrap());
        assert_eq!(line, dollars(750));
        assert_eq!(line.checked_add(dollars(50)), Some(dollars(800)));
        assert_eq!(
            line.checked_add(Price::new(Decimal::ONE, CurrencyCode::EUR)),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(dollars(1999).to_string(), "$19.99");
        assert_eq!(Price::new(Decimal::new(5, 0), CurrencyCode::GBP).to_string(), "£5.00");
    }
}
