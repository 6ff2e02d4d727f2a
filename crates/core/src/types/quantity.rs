//! Cart line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative value.
    #[error("quantity must be a positive integer (got {0})")]
    NotPositive(i64),
    /// Larger than a cart line can hold.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// The rejected value.
        got: i64,
    },
}

/// A strictly positive item count for a cart line.
///
/// Client payloads carry quantities as JSON numbers, so construction goes
/// through [`Quantity::new`] with an `i64` and rejects zero, negatives and
/// values above `u32::MAX`.
///
/// ```
/// use cartseal_core::Quantity;
///
/// assert_eq!(Quantity::new(3).unwrap().get(), 3);
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] if `value` is not in `1..=u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        let narrowed = u32::try_from(value).map_err(|_| QuantityError::TooLarge {
            max: u32::MAX,
            got: value,
        })?;
        NonZeroU32::new(narrowed)
            .map(Self)
            .ok_or(QuantityError::NotPositive(value))
    }

    /// Returns the quantity as a plain integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
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
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(
            Quantity::new(i64::from(u32::MAX)).unwrap().get(),
            u32::MAX
        );
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
        assert_eq!(Quantity::new(-5), Err(QuantityError::NotPositive(-5)));
        assert!(matches!(
            Quantity::new(i64::from(u32::MAX) + 1),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_quantity_deserialize_validates() {
        let q: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(q.get(), 4);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("-2").is_err());
    }

    #[test]
    fn test_quantity_serializes_as_number() {
        let q = Quantity::new(7).unwrap();
        assert_eq!(serde_json::to_string(&q).unwrap(), "7");
    }
}
