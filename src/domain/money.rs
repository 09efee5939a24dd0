use crate::error::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// A monetary value in the marketplace currency.
///
/// Wraps `rust_decimal::Decimal` so that order totals never pass through
/// floating point. Displayed with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Money(pub Decimal);

/// The price of a single unit of a listing. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct UnitPrice(Decimal);

impl UnitPrice {
    pub fn new(value: Decimal) -> Result<Self, MarketError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(MarketError::ValidationError(
                "Unit price must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for UnitPrice {
    type Error = MarketError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitPrice> for Decimal {
    fn from(price: UnitPrice) -> Self {
        price.0
    }
}

impl From<UnitPrice> for Money {
    fn from(price: UnitPrice) -> Self {
        Self(price.0)
    }
}

impl Mul<u32> for UnitPrice {
    type Output = Money;
    fn mul(self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }
}

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Rounds up to whole currency units; the mobile-money provider only
    /// accepts integer amounts and must never be asked for less than owed.
    pub fn whole_units_ceil(&self) -> Result<u64, MarketError> {
        use rust_decimal::prelude::ToPrimitive;
        self.0.ceil().to_u64().ok_or_else(|| {
            MarketError::ValidationError(format!("Amount {} cannot be charged", self))
        })
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unit_price_validation() {
        assert!(UnitPrice::new(dec!(0.01)).is_ok());
        assert!(matches!(
            UnitPrice::new(dec!(0.0)),
            Err(MarketError::ValidationError(_))
        ));
        assert!(matches!(
            UnitPrice::new(dec!(-5.0)),
            Err(MarketError::ValidationError(_))
        ));
    }

    #[test]
    fn test_line_amount_is_exact() {
        let price = UnitPrice::new(dec!(999.99)).unwrap();
        assert_eq!(price * 3, Money::new(dec!(2999.97)));
    }

    #[test]
    fn test_money_sum_and_display() {
        let total: Money = vec![Money::new(dec!(30000.00)), Money::new(dec!(5000.00))]
            .into_iter()
            .sum();
        assert_eq!(total, Money::new(dec!(35000.00)));
        assert_eq!(total.to_string(), "35000.00");
    }

    #[test]
    fn test_whole_units_rounds_up() {
        assert_eq!(Money::new(dec!(100.01)).whole_units_ceil().unwrap(), 101);
        assert_eq!(Money::new(dec!(100.00)).whole_units_ceil().unwrap(), 100);
    }

    #[test]
    fn test_unit_price_rejects_zero_when_deserialized() {
        let parsed: Result<UnitPrice, _> = serde_json::from_str("\"0\"");
        assert!(parsed.is_err());
    }
}
