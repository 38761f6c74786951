//! Cart line quantities.
//!
//! A [`Quantity`] is always at least one and at most [`Quantity::MAX`], the
//! largest value a Postgres `INTEGER` column holds. Values coming from the
//! client-side cart are not trusted: [`Quantity::coerce`] turns anything
//! malformed (zero, negative, fractional below one, non-numeric, missing)
//! into one.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when building a [`Quantity`] strictly.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity was zero or negative.
    #[error("quantity must be a positive integer (got {0})")]
    NotPositive(i64),
    /// Quantity is above [`Quantity::MAX`].
    #[error("quantity is too large (got {0})")]
    TooLarge(i64),
}

/// A positive line-item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// The largest quantity, `i32::MAX`.
    pub const MAX: Self = match Self::new(MAX_VALUE) {
        Some(q) => q,
        None => Self::ONE,
    };

    /// Build a quantity, rejecting zero and anything above [`Self::MAX`].
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value > MAX_VALUE {
            return None;
        }
        match NonZeroU32::new(value) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// The quantity as a plain integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Sum two quantities, saturating at [`Self::MAX`].
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        match Self::new(self.get().saturating_add(other.get())) {
            Some(sum) => sum,
            None => Self::MAX,
        }
    }

    /// Coerce an untrusted JSON value into a quantity, flooring at one.
    ///
    /// ```
    /// use marigold_core::Quantity;
    /// use serde_json::json;
    ///
    /// assert_eq!(Quantity::coerce(&json!(3)).get(), 3);
    /// assert_eq!(Quantity::coerce(&json!("4")).get(), 4);
    /// assert_eq!(Quantity::coerce(&json!(0)).get(), 1);
    /// assert_eq!(Quantity::coerce(&json!(-2)).get(), 1);
    /// assert_eq!(Quantity::coerce(&json!("lots")).get(), 1);
    /// ```
    #[must_use]
    pub fn coerce(value: &serde_json::Value) -> Self {
        let parsed = match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(truncate_float)),
            serde_json::Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(truncate_float))
            }
            _ => None,
        };

        parsed
            .and_then(|v| Self::try_from(v).ok())
            .unwrap_or(Self::ONE)
    }

    /// Serde helper for lenient fields: `#[serde(deserialize_with = "Quantity::deserialize_lenient")]`.
    ///
    /// # Errors
    ///
    /// Never fails on content; only propagates errors from the underlying
    /// deserializer.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value.map_or(Self::ONE, |v| Self::coerce(&v)))
    }
}

const MAX_VALUE: u32 = i32::MAX.unsigned_abs();

#[allow(clippy::cast_possible_truncation)]
fn truncate_float(f: f64) -> i64 {
    if f.is_finite() { f.trunc() as i64 } else { 0 }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(QuantityError::TooLarge(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl From<Quantity> for i32 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(quantity: Quantity) -> Self {
        // Never above i32::MAX.
        quantity.get() as Self
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Deserialize)]
    struct Line {
        #[serde(default, deserialize_with = "Quantity::deserialize_lenient")]
        quantity: Quantity,
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(Quantity::new(0).is_none());
        assert_eq!(Quantity::new(2).unwrap().get(), 2);
    }

    #[test]
    fn test_bounded_by_integer_column() {
        let max = u32::try_from(i32::MAX).unwrap();
        assert_eq!(Quantity::MAX.get(), max);
        assert_eq!(Quantity::new(max), Some(Quantity::MAX));
        assert!(Quantity::new(max + 1).is_none());
        assert!(Quantity::new(u32::MAX).is_none());

        assert_eq!(
            Quantity::try_from(i64::from(i32::MAX)),
            Ok(Quantity::MAX)
        );
        assert_eq!(
            Quantity::try_from(3_000_000_000),
            Err(QuantityError::TooLarge(3_000_000_000))
        );
        assert!(serde_json::from_str::<Quantity>("2147483648").is_err());
        assert_eq!(Quantity::coerce(&json!(3_000_000_000_i64)), Quantity::ONE);

        assert_eq!(i32::from(Quantity::MAX), i32::MAX);
        assert_eq!(i32::from(Quantity::new(42).unwrap()), 42);
    }

    #[test]
    fn test_coerce_floors_malformed_values() {
        assert_eq!(Quantity::coerce(&json!(0)), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!(-5)), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!(0.4)), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!(null)), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!([2])), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!("NaN")), Quantity::ONE);
        assert_eq!(Quantity::coerce(&json!(1e20)), Quantity::ONE);
    }

    #[test]
    fn test_coerce_accepts_numeric_strings_and_floats() {
        assert_eq!(Quantity::coerce(&json!(" 7 ")).get(), 7);
        assert_eq!(Quantity::coerce(&json!(2.9)).get(), 2);
        assert_eq!(Quantity::coerce(&json!("3.0")).get(), 3);
    }

    #[test]
    fn test_strict_deserialize() {
        assert_eq!(serde_json::from_str::<Quantity>("5").unwrap().get(), 5);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("-1").is_err());
    }

    #[test]
    fn test_lenient_field() {
        let line: Line = serde_json::from_value(json!({"quantity": "abc"})).unwrap();
        assert_eq!(line.quantity, Quantity::ONE);

        let line: Line = serde_json::from_value(json!({})).unwrap();
        assert_eq!(line.quantity, Quantity::ONE);

        let line: Line = serde_json::from_value(json!({"quantity": 6})).unwrap();
        assert_eq!(line.quantity.get(), 6);
    }

    #[test]
    fn test_saturating_add() {
        assert_eq!(Quantity::MAX.saturating_add(Quantity::ONE), Quantity::MAX);
        assert_eq!(Quantity::MAX.saturating_add(Quantity::MAX), Quantity::MAX);
        assert_eq!(
            Quantity::new(2).unwrap().saturating_add(Quantity::new(3).unwrap()).get(),
            5
        );
    }
}
