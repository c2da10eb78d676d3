//! Amount conversion into minor units.
//!
//! Nodes report output values as coin-denominated decimals. Everything past the
//! resolver works on integer minor units (satoshis) to avoid floating-point drift.

use crate::TypesError;

/// Number of minor units in one coin.
pub const MINOR_UNITS_PER_COIN: i64 = 100_000_000;

/// Largest amount that can exist on chain: 21 million coins.
pub const MAX_MONEY: i64 = 21_000_000 * MINOR_UNITS_PER_COIN;

/// `true` if `value` is a possible on-chain amount.
pub fn money_range(value: i64) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Sum `values`, failing if any value or the running total leaves
/// [`money_range`]. Both bounds keep the sum far from `i64` overflow.
pub fn checked_total(values: impl IntoIterator<Item = i64>) -> Result<i64, TypesError> {
    values.into_iter().try_fold(0i64, |total, value| {
        if !money_range(value) {
            return Err(TypesError::InvalidAmount(value.to_string()));
        }
        total
            .checked_add(value)
            .filter(|sum| money_range(*sum))
            .ok_or_else(|| TypesError::InvalidAmount(format!("total exceeds {MAX_MONEY}")))
    })
}

/// Convert a coin-denominated value into minor units, rounding to the nearest unit.
///
/// Truncation would turn `0.1` into `9_999_999` because of binary representation,
/// so the product is rounded instead.
pub fn to_minor_units(value: f64) -> Result<i64, TypesError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TypesError::InvalidAmount(value.to_string()));
    }
    let scaled = (value * MINOR_UNITS_PER_COIN as f64).round();
    if scaled > MAX_MONEY as f64 {
        return Err(TypesError::InvalidAmount(value.to_string()));
    }
    Ok(scaled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_instead_of_truncating() {
        assert_eq!(to_minor_units(0.1).unwrap(), 10_000_000);
        assert_eq!(to_minor_units(0.0499).unwrap(), 4_990_000);
        assert_eq!(to_minor_units(0.05).unwrap(), 5_000_000);
    }

    #[test]
    fn zero_is_valid() {
        assert_eq!(to_minor_units(0.0).unwrap(), 0);
    }

    #[test]
    fn negative_and_nan_are_rejected() {
        assert!(to_minor_units(-1.0).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
        assert!(to_minor_units(f64::INFINITY).is_err());
    }

    #[test]
    fn above_max_supply_is_rejected() {
        assert_eq!(to_minor_units(21_000_000.0).unwrap(), MAX_MONEY);
        assert!(to_minor_units(21_000_000.000_001).is_err());
        assert!(to_minor_units(92_233_720_368.0).is_err());
    }

    #[test]
    fn checked_total_stops_at_max_supply() {
        assert_eq!(checked_total([1, 2, 3]), Ok(6));
        assert_eq!(checked_total(Vec::new()), Ok(0));
        assert!(checked_total([MAX_MONEY, 1]).is_err());
        assert!(checked_total([i64::MAX, i64::MAX]).is_err());
        assert!(checked_total([-1]).is_err());
    }
}
