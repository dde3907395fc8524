//! Shared permissive-numeric policy
//!
//! Historical order documents carry amounts that may be absent, negative,
//! or not numbers at all. Every such value passes through [`coerce_amount`]
//! before arithmetic, and every persisted amount passes through [`round2`],
//! so a NaN or Infinity can never reach a snapshot field.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Coerce a permissive wire/storage number to a non-negative `Decimal`.
/// NaN, infinities, and negative values all become zero.
pub fn coerce_amount(value: f64) -> Decimal {
    if !value.is_finite() || value < 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Round to 2 decimal places, midpoint away from zero (commercial half-up
/// for the non-negative amounts this crate deals in).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn coerce_rejects_degenerate_input() {
        assert_eq!(coerce_amount(f64::NAN), Decimal::ZERO);
        assert_eq!(coerce_amount(f64::INFINITY), Decimal::ZERO);
        assert_eq!(coerce_amount(-12.5), Decimal::ZERO);
        assert_eq!(coerce_amount(12.5), dec!(12.5));
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(dec!(100.005)), dec!(100.01));
        assert_eq!(round2(dec!(100.004)), dec!(100.00));
        assert_eq!(round2(dec!(18.0)), dec!(18.0));
    }
}
