// src/amount.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// Coin amount with 2 decimal places, stored as a scaled integer (minor units).
///
/// All arithmetic stays in minor units; display conversion happens only at the
/// edges. Serialized as the scaled integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(transparent)]
pub struct Coins(i64);

impl Coins {
    pub const SCALE: i64 = 100;
    pub const ZERO: Coins = Coins(0);

    pub fn from_minor(value: i64) -> Self {
        Coins(value)
    }

    pub fn from_major(value: i64) -> Self {
        Coins(value * Self::SCALE)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Display units as a float, for outbound payloads only.
    pub fn to_display(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Coins {
        Coins(self.0.abs())
    }

    pub fn checked_add(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_add(rhs.0).map(Coins)
    }

    pub fn checked_sub(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_sub(rhs.0).map(Coins)
    }

    /// Parse a decimal string like `"12"`, `"12.5"` or `"12.50"`.
    ///
    /// More than two fractional digits is rejected, never rounded.
    pub fn parse(input: &str) -> Result<Coins, LedgerError> {
        let input = input.trim();
        let (sign, body) = match input.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, input),
        };

        if body.is_empty() {
            return Err(LedgerError::InvalidAmount);
        }

        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(LedgerError::InvalidAmount);
        }
        if frac.len() > 2 {
            return Err(LedgerError::InvalidAmount);
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidAmount);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| LedgerError::InvalidAmount)?
        };

        let frac_minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| LedgerError::InvalidAmount)? * 10,
            _ => frac.parse().map_err(|_| LedgerError::InvalidAmount)?,
        };

        whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac_minor))
            .map(|v| Coins(sign * v))
            .ok_or(LedgerError::InvalidAmount)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Coins {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Coins(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Coins {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Coins(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Coins {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Coins(-self.0)
    }
}

impl std::ops::AddAssign for Coins {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Coins {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Coins {
    fn sum<I: Iterator<Item = Coins>>(iter: I) -> Self {
        iter.fold(Coins::ZERO, |acc, c| acc + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_scales() {
        assert_eq!(Coins::from_major(100), Coins::from_minor(10_000));
    }

    #[test]
    fn parse_whole() {
        assert_eq!(Coins::parse("12").unwrap(), Coins::from_minor(1200));
        assert_eq!(Coins::parse("0").unwrap(), Coins::ZERO);
    }

    #[test]
    fn parse_one_fraction_digit() {
        assert_eq!(Coins::parse("12.5").unwrap(), Coins::from_minor(1250));
    }

    #[test]
    fn parse_two_fraction_digits() {
        assert_eq!(Coins::parse("12.50").unwrap(), Coins::from_minor(1250));
        assert_eq!(Coins::parse("0.01").unwrap(), Coins::from_minor(1));
    }

    #[test]
    fn parse_negative() {
        assert_eq!(Coins::parse("-3.25").unwrap(), Coins::from_minor(-325));
    }

    #[test]
    fn parse_rejects_sub_cent_precision() {
        assert!(matches!(
            Coins::parse("1.001"),
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            Coins::parse("0.999"),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Coins::parse("").is_err());
        assert!(Coins::parse(".").is_err());
        assert!(Coins::parse("abc").is_err());
        assert!(Coins::parse("1.2x").is_err());
        assert!(Coins::parse("1,50").is_err());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Coins::from_minor(1250).to_string(), "12.50");
        assert_eq!(Coins::from_minor(5).to_string(), "0.05");
        assert_eq!(Coins::from_minor(-325).to_string(), "-3.25");
        assert_eq!(Coins::ZERO.to_string(), "0.00");
    }

    #[test]
    fn arithmetic() {
        let a = Coins::from_minor(100);
        let b = Coins::from_minor(40);
        assert_eq!(a + b, Coins::from_minor(140));
        assert_eq!(a - b, Coins::from_minor(60));
        assert_eq!(-a, Coins::from_minor(-100));
    }

    #[test]
    fn ordering() {
        assert!(Coins::from_minor(-1) < Coins::ZERO);
        assert!(Coins::ZERO < Coins::from_minor(1));
    }

    #[test]
    fn sum() {
        let total: Coins = [10, 20, 30].into_iter().map(Coins::from_minor).sum();
        assert_eq!(total, Coins::from_minor(60));
    }
}
