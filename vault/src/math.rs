//! # Wide Fixed-Point Arithmetic
//!
//! `u128` amounts multiplied by `u128` supplies overflow `u128` long before
//! they overflow reality, so every share/asset conversion goes through
//! [`mul_div`]: a full 256-bit intermediate product followed by a division
//! with an explicit rounding policy.
//!
//! The rounding direction is not a cosmetic detail. Share issuance rounds
//! down and share redemption rounds down, while "give me exactly N" paths
//! round up, so every rounding error lands on the caller and never on the
//! pool. See [`crate::vault`] for where each direction is used.

use thiserror::Error;

/// Errors from wide arithmetic. Both are terminal for the enclosing
/// operation; there is no partial result to salvage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MathError {
    /// Division by zero. Reachable only from degenerate vault states
    /// (nonzero supply with zero pooled assets), which the seeding
    /// lifecycle exists to prevent.
    #[error("division by zero")]
    DivisionByZero,

    /// The quotient does not fit in 128 bits.
    #[error("arithmetic overflow: quotient exceeds 128 bits")]
    Overflow,
}

/// Remainder policy for [`mul_div`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate toward zero. Favors the vault.
    Down,
    /// Round away from zero on any nonzero remainder. Favors exactness
    /// for the caller at the caller's expense.
    Up,
}

/// Computes `a * b / denominator` without intermediate overflow.
///
/// The product is carried in two 128-bit limbs; the division requires the
/// high limb to be strictly less than the denominator (otherwise the
/// quotient would need more than 128 bits and we fail with
/// [`MathError::Overflow`]).
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, MathError> {
    let (hi, lo) = mul_wide(a, b);
    let (quotient, remainder) = div_wide(hi, lo, denominator)?;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up if remainder == 0 => Ok(quotient),
        Rounding::Up => quotient.checked_add(1).ok_or(MathError::Overflow),
    }
}

/// Full 256-bit product of two `u128` values as `(high, low)` limbs.
///
/// Schoolbook multiplication over 64-bit half-words. The high limb cannot
/// overflow: the largest possible product is `(2^128 - 1)^2 < 2^256`.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1u128 << 64) - 1;

    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    // Middle column: carries from ll plus the low halves of the cross terms.
    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);

    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Divides the 256-bit value `(hi, lo)` by `d`, returning
/// `(quotient, remainder)`.
///
/// Binary long division, one bit of `lo` per step. The invariant is that
/// the running remainder stays below `d`; when the shift would carry out of
/// 128 bits the subtraction of `d` is still exact modulo 2^128 because the
/// true remainder is below `2 * d`.
fn div_wide(hi: u128, lo: u128, d: u128) -> Result<(u128, u128), MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    if hi == 0 {
        return Ok((lo / d, lo % d));
    }
    if hi >= d {
        return Err(MathError::Overflow);
    }

    let mut remainder = hi;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> i) & 1);
        if carry == 1 || remainder >= d {
            remainder = remainder.wrapping_sub(d);
            quotient |= 1 << i;
        }
    }
    Ok((quotient, remainder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_match_native_division() {
        assert_eq!(mul_div(6, 7, 2, Rounding::Down).unwrap(), 21);
        assert_eq!(mul_div(10, 10, 3, Rounding::Down).unwrap(), 33);
        assert_eq!(mul_div(10, 10, 3, Rounding::Up).unwrap(), 34);
    }

    #[test]
    fn exact_division_ignores_rounding() {
        assert_eq!(mul_div(100, 50, 25, Rounding::Down).unwrap(), 200);
        assert_eq!(mul_div(100, 50, 25, Rounding::Up).unwrap(), 200);
    }

    #[test]
    fn zero_operands() {
        assert_eq!(mul_div(0, u128::MAX, 7, Rounding::Up).unwrap(), 0);
        assert_eq!(mul_div(u128::MAX, 0, 7, Rounding::Up).unwrap(), 0);
    }

    #[test]
    fn division_by_zero_rejected() {
        assert_eq!(
            mul_div(1, 1, 0, Rounding::Down),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn product_wider_than_128_bits() {
        // 1000e18 * 1e21 overflows u128 (~2^140) but divides back down fine.
        let a = 1_000u128 * 10u128.pow(18);
        let b = 10u128.pow(21);
        assert_eq!(mul_div(a, b, b, Rounding::Down).unwrap(), a);
        assert_eq!(mul_div(a, b, a, Rounding::Down).unwrap(), b);
    }

    #[test]
    fn max_times_max_over_max_is_max() {
        assert_eq!(
            mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Down).unwrap(),
            u128::MAX
        );
    }

    #[test]
    fn quotient_overflow_rejected() {
        // MAX * 2 / 1 needs 129 bits.
        assert_eq!(
            mul_div(u128::MAX, 2, 1, Rounding::Down),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn up_rounding_overflow_at_boundary_rejected() {
        // (2^96 - 1)(2^96 + 1) = 2^192 - 1, so dividing by 2^64 gives a
        // quotient of exactly u128::MAX with remainder 2^64 - 1. Rounding
        // down is representable; rounding up would need 2^128.
        let a = (1u128 << 96) - 1;
        let b = (1u128 << 96) + 1;
        let d = 1u128 << 64;
        assert_eq!(mul_div(a, b, d, Rounding::Down).unwrap(), u128::MAX);
        assert_eq!(mul_div(a, b, d, Rounding::Up), Err(MathError::Overflow));
    }

    #[test]
    fn mul_wide_known_values() {
        let (hi, lo) = mul_wide(u128::MAX, u128::MAX);
        // (2^128 - 1)^2 = 2^256 - 2^129 + 1
        assert_eq!(hi, u128::MAX - 1);
        assert_eq!(lo, 1);

        let (hi, lo) = mul_wide(1u128 << 127, 2);
        assert_eq!(hi, 1);
        assert_eq!(lo, 0);
    }

    #[test]
    fn div_wide_reconstructs_product() {
        // q * d + r round-trips for a spread of awkward operands.
        let cases = [
            (3u128, 10u128.pow(30), 7u128),
            (u128::MAX / 3, 12345, 999_999_937),
            (10u128.pow(27), 10u128.pow(21), 10u128.pow(18)),
        ];
        for (a, b, d) in cases {
            let (hi, lo) = mul_wide(a, b);
            let (q, r) = div_wide(hi, lo, d).unwrap();
            assert!(r < d);
            let (qhi, qlo) = mul_wide(q, d);
            let (sum_lo, carry) = qlo.overflowing_add(r);
            assert_eq!((qhi + u128::from(carry), sum_lo), (hi, lo));
        }
    }

    #[test]
    fn round_trip_never_creates_value() {
        // Emulates toShares -> toAssets with a skewed share price. The result
        // of the down-rounded round trip can never exceed the input.
        let total_assets = 1_000_000_000_000_000_000_000u128 + 31337;
        let total_supply = 999_999_999_999_999_999_999u128;
        for assets in [1u128, 999, 10u128.pow(18), 10u128.pow(18) + 1] {
            let shares = mul_div(assets, total_supply, total_assets, Rounding::Down).unwrap();
            let back = mul_div(shares, total_assets, total_supply, Rounding::Down).unwrap();
            assert!(back <= assets, "round trip inflated {assets} into {back}");
        }
    }
}
