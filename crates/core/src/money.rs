//! # Money Module
//!
//! `Amount` is a signed count of minor currency units (cents for a
//! 2-decimal currency). Balances and transfer amounts are never floating
//! point; `rust_decimal` is only used at the edges to parse and render
//! major-unit values such as `"10.50"`.

use crate::error::{CoreError, CoreResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest scale accepted when converting to and from major units.
pub const MAX_DECIMALS: u32 = 18;

/// Monetary amount in minor units.
///
/// # Examples
/// ```
/// use billbank_core::Amount;
/// use rust_decimal_macros::dec;
///
/// let ten = Amount::from_major(dec!(10), 2).unwrap();
/// assert_eq!(ten.minor(), 1000);
/// assert_eq!(ten.to_major(2), dec!(10.00));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw minor-unit value
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Raw minor-unit value
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert a major-unit decimal (`10.50`) into minor units at `decimals` scale.
    ///
    /// Rejects values with more precision than the scale allows and values
    /// that do not fit in an `i64`.
    pub fn from_major(value: Decimal, decimals: u32) -> CoreResult<Self> {
        let factor = scale_factor(decimals)?;
        let scaled = value
            .checked_mul(factor)
            .ok_or_else(|| CoreError::InvalidAmount(format!("{} overflows", value)))?;

        if !scaled.fract().is_zero() {
            return Err(CoreError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                value, decimals
            )));
        }

        scaled
            .to_i64()
            .map(Self)
            .ok_or_else(|| CoreError::InvalidAmount(format!("{} overflows", value)))
    }

    /// Render as a major-unit decimal at `decimals` scale
    pub fn to_major(self, decimals: u32) -> Decimal {
        Decimal::new(self.0, decimals.min(MAX_DECIMALS))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Fails with `InvalidAmount` unless strictly positive
    pub fn ensure_positive(self) -> CoreResult<Self> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(CoreError::InvalidAmount(format!(
                "amount must be positive: {}",
                self.0
            )))
        }
    }
}

fn scale_factor(decimals: u32) -> CoreResult<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(CoreError::UnsupportedScale(decimals));
    }
    Ok(Decimal::from(10u64.pow(decimals)))
}

impl From<i64> for Amount {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
