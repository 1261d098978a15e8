//! Value objects: equality by value, not identity.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by value; "changing" one means
/// building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A non-negative sterling amount held in minor units (pence).
///
/// Rates, contract values and payments all use this type so that no
/// floating point ever reaches a stored amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(pence: i64) -> DomainResult<Self> {
        if pence < 0 {
            return Err(DomainError::validation("amount must not be negative"));
        }
        Ok(Self(pence))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Parse a decimal string such as `"12.5"`, `"12.50"` or `"£1,200"`.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let cleaned: String = input
            .trim()
            .trim_start_matches('£')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        if cleaned.is_empty() {
            return Err(DomainError::validation("amount is required"));
        }

        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if fraction.len() > 2 {
            return Err(DomainError::validation("amount has more than two decimal places"));
        }
        let digits_ok = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits_ok(whole) || !digits_ok(fraction) {
            return Err(DomainError::validation(format!("invalid amount '{}'", input.trim())));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| DomainError::validation("amount is too large"))?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse::<i64>().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|p| p.checked_add(fraction))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount is too large"))
    }
}

impl TryFrom<i64> for Money {
    type Error = DomainError;

    fn try_from(pence: i64) -> Result<Self, Self::Error> {
        Money::from_minor(pence)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "£{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).fold(0i64, i64::saturating_add))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_common_inputs() {
        assert_eq!(Money::parse("12").unwrap().minor(), 1200);
        assert_eq!(Money::parse("12.5").unwrap().minor(), 1250);
        assert_eq!(Money::parse("£1,200.05").unwrap().minor(), 120005);
        assert_eq!(Money::parse(" 0.99 ").unwrap().minor(), 99);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse("-4").is_err());
        assert!(Money::parse("1.234").is_err());
        assert!(Money::parse("abc").is_err());
        assert!(Money::parse(".50").is_err());
    }

    #[test]
    fn negative_minor_units_are_rejected() {
        assert!(Money::from_minor(-1).is_err());
    }

    #[test]
    fn deserializing_a_negative_amount_fails() {
        assert!(serde_json::from_str::<Money>("-500").is_err());
        assert_eq!(serde_json::from_str::<Money>("500").unwrap().minor(), 500);
        assert_eq!(serde_json::to_string(&Money::from_minor(99).unwrap()).unwrap(), "99");
    }

    #[test]
    fn display_uses_pounds_and_pence() {
        assert_eq!(Money::from_minor(120005).unwrap().to_string(), "£1200.05");
        assert_eq!(Money::ZERO.to_string(), "£0.00");
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(pence in 0i64..10_000_000_000) {
            let m = Money::from_minor(pence).unwrap();
            prop_assert_eq!(Money::parse(&m.to_string()).unwrap(), m);
        }
    }
}
