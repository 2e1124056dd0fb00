use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "NGN";

//--------------------------------------     MinorUnits       ---------------------------------------------------------
/// A monetary amount in the smallest unit of the settlement currency (kobo, cents).
///
/// The payment gateway reports and accepts amounts in minor units, so the whole workspace keeps money in this form
/// and never touches floating point.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor units: {0}")]
pub struct MinorUnitsConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for MinorUnits {
    type Error = MinorUnitsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MinorUnitsConversionError(format!("Value {value} is too large to convert to MinorUnits")))
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns `percent`% of this amount, rounded down.
    pub fn percent(&self, percent: u8) -> Self {
        Self(self.0 * i64::from(percent) / 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(MinorUnits::from(50_000).to_string(), "500.00");
        assert_eq!(MinorUnits::from(49_999).to_string(), "499.99");
        assert_eq!(MinorUnits::from(5).to_string(), "0.05");
        assert_eq!(MinorUnits::from(-150).to_string(), "-1.50");
    }

    #[test]
    fn arithmetic() {
        let a = MinorUnits::from_major(500);
        assert_eq!(a.value(), 50_000);
        assert_eq!(a.percent(30), MinorUnits::from(15_000));
        assert_eq!(a - a.percent(30), MinorUnits::from(35_000));
        assert_eq!(MinorUnits::from(999).percent(30), MinorUnits::from(299));
        let total: MinorUnits = [a, MinorUnits::from(1)].into_iter().sum();
        assert_eq!(total.value(), 50_001);
        let mut b = MinorUnits::default();
        b += MinorUnits::from(7);
        assert_eq!(b.value(), 7);
    }

    #[test]
    fn conversions() {
        assert!(MinorUnits::try_from(u64::MAX).is_err());
        assert_eq!(MinorUnits::try_from(42u64).unwrap().value(), 42);
        let json = serde_json::to_string(&MinorUnits::from(1234)).unwrap();
        assert_eq!(json, "1234");
    }
}
