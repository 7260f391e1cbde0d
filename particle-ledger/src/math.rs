//! Fixed-point arithmetic for Asset ↔ Interest-bearing unit conversion
//!
//! All amounts are `u128` in the smallest unit of the asset. The exchange
//! rate is a fixed-point number scaled by [`RATE_SCALE`], read as "asset
//! units per interest-bearing unit". Every conversion has an explicit
//! rounding direction:
//!
//! - converting interest → asset rounds DOWN (value owed to a user is never
//!   overstated by rounding)
//! - converting asset → interest for a withdrawal rounds UP (the consumer
//!   pays at least full price in interest units)
//! - converting asset → interest for a deposit credit rounds DOWN (the pool
//!   keeps the dust, never the depositor)
//!
//! The pair guarantees `to_asset_floor(to_interest_ceil(x)) >= x` for all
//! `x` and all rates `>= Rate::ONE`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale for exchange rates (1.0 == 10^18)
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Exchange rate between the Asset unit and the Interest-bearing unit
///
/// Scaled by [`RATE_SCALE`]; monotonically non-decreasing over the lifetime
/// of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u128);

impl Rate {
    /// The identity rate (1 interest unit == 1 asset unit)
    pub const ONE: Rate = Rate(RATE_SCALE);

    /// Create from a raw scaled value
    pub fn from_scaled(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw scaled value
    pub fn as_scaled(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / RATE_SCALE, self.0 % RATE_SCALE)
    }
}

/// Convert interest-bearing units to asset units, rounding down
pub fn to_asset_floor(interest: u128, rate: Rate) -> Result<u128> {
    let product = interest
        .checked_mul(rate.0)
        .ok_or_else(|| overflow("interest to asset", interest))?;
    Ok(product / RATE_SCALE)
}

/// Convert asset units to interest-bearing units, rounding down
///
/// Used when crediting a deposit: the pool never loses value to rounding.
pub fn to_interest_floor(asset: u128, rate: Rate) -> Result<u128> {
    if rate.0 == 0 {
        return Err(Error::OracleUnavailable("zero exchange rate".to_string()));
    }
    let product = asset
        .checked_mul(RATE_SCALE)
        .ok_or_else(|| overflow("asset to interest", asset))?;
    Ok(product / rate.0)
}

/// Convert asset units to interest-bearing units, rounding up
///
/// Used when consuming interest to pay out a requested asset amount: the
/// receiver never gets less than requested.
pub fn to_interest_ceil(asset: u128, rate: Rate) -> Result<u128> {
    if rate.0 == 0 {
        return Err(Error::OracleUnavailable("zero exchange rate".to_string()));
    }
    let product = asset
        .checked_mul(RATE_SCALE)
        .ok_or_else(|| overflow("asset to interest", asset))?;
    Ok(product.div_ceil(rate.0))
}

/// Subtraction clamped to zero
///
/// Used only for charge reporting, where a transient negative value is a
/// policy clamp, never an error.
pub fn clamped_sub(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Basis-points share of an amount, rounding down
pub fn basis_points(amount: u128, bps: u32) -> Result<u128> {
    let product = amount
        .checked_mul(u128::from(bps))
        .ok_or_else(|| overflow("basis points", amount))?;
    Ok(product / 10_000)
}

fn overflow(op: &str, amount: u128) -> Error {
    Error::AmountOverflow(format!("{op}: {amount}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rate_round_trips() {
        assert_eq!(to_asset_floor(100, Rate::ONE).unwrap(), 100);
        assert_eq!(to_interest_floor(100, Rate::ONE).unwrap(), 100);
        assert_eq!(to_interest_ceil(100, Rate::ONE).unwrap(), 100);
    }

    #[test]
    fn test_rounding_directions() {
        // Rate 1.5: 10 asset -> 6.66.. interest
        let rate = Rate::from_scaled(RATE_SCALE + RATE_SCALE / 2);
        assert_eq!(to_interest_floor(10, rate).unwrap(), 6);
        assert_eq!(to_interest_ceil(10, rate).unwrap(), 7);
        // 7 interest -> 10.5 asset, floored
        assert_eq!(to_asset_floor(7, rate).unwrap(), 10);
    }

    #[test]
    fn test_withdraw_pair_never_shortchanges() {
        // to_asset_floor(to_interest_ceil(x)) >= x
        let rates = [
            Rate::ONE,
            Rate::from_scaled(RATE_SCALE + 1),
            Rate::from_scaled(RATE_SCALE * 3 / 2),
            Rate::from_scaled(RATE_SCALE * 7),
        ];
        for rate in rates {
            for x in [1u128, 3, 99, 1_000_000, 123_456_789] {
                let interest = to_interest_ceil(x, rate).unwrap();
                let back = to_asset_floor(interest, rate).unwrap();
                assert!(back >= x, "rate {rate}: {back} < {x}");
            }
        }
    }

    #[test]
    fn test_clamped_sub() {
        assert_eq!(clamped_sub(10, 3), 7);
        assert_eq!(clamped_sub(3, 10), 0);
        assert_eq!(clamped_sub(0, 0), 0);
    }

    #[test]
    fn test_basis_points_floor() {
        assert_eq!(basis_points(10_000, 50).unwrap(), 50); // 0.5%
        assert_eq!(basis_points(999, 100).unwrap(), 9); // floored
        assert_eq!(basis_points(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_overflow_is_hard_error() {
        let result = to_asset_floor(u128::MAX, Rate::from_scaled(2 * RATE_SCALE));
        assert!(matches!(result, Err(Error::AmountOverflow(_))));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = to_interest_ceil(100, Rate::from_scaled(0));
        assert!(matches!(result, Err(Error::OracleUnavailable(_))));
    }
}
