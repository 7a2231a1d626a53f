//! Shared helpers for one-decimal temperature rounding.
//!
//! Values are rounded in decimal arithmetic (`rust_decimal`), starting from the
//! shortest decimal representation of each f64. A reading written as `40.15`
//! therefore rounds as `40.15`, not as its binary approximation `40.1499…`.
//!
//! Ties round half away from zero: `40.15 → 40.2`, `-1.05 → -1.1`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Convert an f64 to Decimal using its shortest round-trip representation.
///
/// Returns `Decimal::ZERO` for non-finite inputs (NaN, ±Inf).
pub(crate) fn f64_to_decimal(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!("f64_to_decimal received non-finite value {}, defaulting to 0", v);
        return Decimal::ZERO;
    }
    Decimal::from_str(&v.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(v))
        .unwrap_or(Decimal::ZERO)
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn round_dec_1dp(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Round an f64 to one decimal place, ties away from zero.
pub(crate) fn round_1dp(v: f64) -> f64 {
    dec_to_f64(round_dec_1dp(f64_to_decimal(v)))
}

/// Unweighted arithmetic mean rounded to one decimal place.
///
/// Returns `None` for an empty input.
pub(crate) fn mean_1dp<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let decimals: Vec<Decimal> = values.into_iter().map(f64_to_decimal).collect();
    if decimals.is_empty() {
        return None;
    }
    let count = Decimal::from(decimals.len());

    let sum = decimals
        .iter()
        .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(*d));

    match sum.and_then(|s| s.checked_div(count)) {
        Some(mean) => Some(dec_to_f64(round_dec_1dp(mean))),
        None => {
            // Only reachable for sums beyond Decimal's range.
            let total: f64 = decimals.iter().copied().map(dec_to_f64).sum();
            Some(round_1dp(total / decimals.len() as f64))
        }
    }
}
