//! Fixed-point arithmetic for ray (1e27) and wad (1e18) scaled values.
//!
//! Multiplications and divisions round half up:
//!
//! ```text
//! mul(a, b) = (a * b + SCALE / 2) / SCALE
//! div(a, b) = (a * SCALE + b / 2) / b
//! ```
//!
//! Every operation is checked. A double-width intermediate that does not fit
//! in 256 bits fails with [`EngineError::ArithmeticOverflow`] and a zero
//! divisor fails with [`EngineError::DivisionByZero`]; nothing is clamped.
//!
//! Ray and wad values must be rescaled with [`ray_to_wad`] / [`wad_to_ray`]
//! before they are combined.

use alloy_primitives::U256;

use crate::error::{EngineError, Result};

/// 1e18
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 0.5e18
pub const HALF_WAD: U256 = U256::from_limbs([500_000_000_000_000_000, 0, 0, 0]);

/// 1e27
pub const RAY: U256 = U256::from_limbs([0x9FD0_803C_E800_0000, 0x033B_2E3C, 0, 0]);

/// 0.5e27
pub const HALF_RAY: U256 = U256::from_limbs([0x4FE8_401E_7400_0000, 0x019D_971E, 0, 0]);

/// 1e9, the ratio between ray and wad
pub const WAD_RAY_RATIO: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// 100% in basis points
pub const PERCENTAGE_FACTOR: U256 = U256::from_limbs([10_000, 0, 0, 0]);

/// 50% in basis points
pub const HALF_PERCENT: U256 = U256::from_limbs([5_000, 0, 0, 0]);

/// Seconds in a 365 day year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

pub(crate) fn checked_mul(operation: &'static str, lhs: U256, rhs: U256) -> Result<U256> {
    lhs.checked_mul(rhs)
        .ok_or(EngineError::ArithmeticOverflow { operation, lhs, rhs })
}

pub(crate) fn checked_add(operation: &'static str, lhs: U256, rhs: U256) -> Result<U256> {
    lhs.checked_add(rhs)
        .ok_or(EngineError::ArithmeticOverflow { operation, lhs, rhs })
}

pub(crate) fn checked_sub(operation: &'static str, lhs: U256, rhs: U256) -> Result<U256> {
    lhs.checked_sub(rhs)
        .ok_or(EngineError::ArithmeticOverflow { operation, lhs, rhs })
}

fn checked_div(operation: &'static str, numerator: U256, divisor: U256) -> Result<U256> {
    numerator
        .checked_div(divisor)
        .ok_or(EngineError::DivisionByZero { operation, numerator })
}

/// `(a * b + half) / scale`
fn scaled_mul(operation: &'static str, a: U256, b: U256, scale: U256, half: U256) -> Result<U256> {
    if a.is_zero() || b.is_zero() {
        return Ok(U256::ZERO);
    }
    let product = checked_mul(operation, a, b)?;
    let rounded = product
        .checked_add(half)
        .ok_or(EngineError::ArithmeticOverflow { operation, lhs: a, rhs: b })?;
    Ok(rounded / scale)
}

/// `(a * scale + b / 2) / b`
fn scaled_div(operation: &'static str, a: U256, b: U256, scale: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(EngineError::DivisionByZero {
            operation,
            numerator: a,
        });
    }
    let product = checked_mul(operation, a, scale)?;
    let rounded = product
        .checked_add(b / U256::from(2))
        .ok_or(EngineError::ArithmeticOverflow { operation, lhs: a, rhs: b })?;
    Ok(rounded / b)
}

/// Multiplies two rays, rounding half up to the nearest ray.
pub fn ray_mul(a: U256, b: U256) -> Result<U256> {
    scaled_mul("ray_mul", a, b, RAY, HALF_RAY)
}

/// Divides two rays, rounding half up to the nearest ray.
pub fn ray_div(a: U256, b: U256) -> Result<U256> {
    scaled_div("ray_div", a, b, RAY)
}

/// Multiplies two wads, rounding half up to the nearest wad.
pub fn wad_mul(a: U256, b: U256) -> Result<U256> {
    scaled_mul("wad_mul", a, b, WAD, HALF_WAD)
}

/// Divides two wads, rounding half up to the nearest wad.
pub fn wad_div(a: U256, b: U256) -> Result<U256> {
    scaled_div("wad_div", a, b, WAD)
}

/// Applies a basis point percentage to a value: `value * bps / 10000`, rounded half up.
pub fn percent_mul(value: U256, bps: U256) -> Result<U256> {
    scaled_mul("percent_mul", value, bps, PERCENTAGE_FACTOR, HALF_PERCENT)
}

/// Divides a value by a basis point percentage: `value * 10000 / bps`, rounded half up.
pub fn percent_div(value: U256, bps: U256) -> Result<U256> {
    scaled_div("percent_div", value, bps, PERCENTAGE_FACTOR)
}

/// Rescales a ray to a wad, rounding half up.
pub fn ray_to_wad(a: U256) -> Result<U256> {
    let rounded = checked_add("ray_to_wad", a, WAD_RAY_RATIO / U256::from(2))?;
    Ok(rounded / WAD_RAY_RATIO)
}

/// Rescales a wad to a ray.
pub fn wad_to_ray(a: U256) -> Result<U256> {
    checked_mul("wad_to_ray", a, WAD_RAY_RATIO)
}

/// Computes `floor(a * b / c)`.
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256> {
    let product = checked_mul("mul_div", a, b)?;
    checked_div("mul_div", product, c)
}

/// Computes `ceil(a * b / c)`.
pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256> {
    let product = checked_mul("mul_div_up", a, b)?;
    let quotient = checked_div("mul_div_up", product, c)?;
    if (product % c).is_zero() {
        Ok(quotient)
    } else {
        checked_add("mul_div_up", quotient, U256::from(1))
    }
}

/// Returns `a - b`, or zero if `b > a`.
pub fn zero_floor_sub(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

/// Raises a ray to an integer power by squaring.
///
/// Performs at most `2 * log2(n)` ray multiplications.
pub fn ray_pow(x: U256, n: u64) -> Result<U256> {
    let mut base = x;
    let mut exp = n;
    let mut acc = if exp % 2 != 0 { base } else { RAY };
    exp /= 2;

    while exp != 0 {
        base = ray_mul(base, base)?;
        if exp % 2 != 0 {
            acc = ray_mul(acc, base)?;
        }
        exp /= 2;
    }

    Ok(acc)
}

/// Linear interest factor accumulated over `elapsed` seconds at an annual ray `rate`.
///
/// Returns `RAY + rate * elapsed / SECONDS_PER_YEAR`.
pub fn calculate_linear_interest(rate: U256, elapsed: u64) -> Result<U256> {
    let accrued = mul_div(rate, U256::from(elapsed), U256::from(SECONDS_PER_YEAR))?;
    checked_add("linear_interest", RAY, accrued)
}

/// Compound interest factor `(1 + rate / SECONDS_PER_YEAR) ^ elapsed`, in ray.
///
/// Gaps up to `taylor_max_elapsed` seconds use a third-order binomial
/// expansion:
///
/// ```text
/// 1 + n*x + n(n-1)/2 * x^2 + n(n-1)(n-2)/6 * x^3
/// ```
///
/// which underestimates the exact factor by at most `(r * t)^4 / 24` in
/// relative terms (about 1.9e-10 for a 100% annual rate over three days).
/// Longer gaps are exponentiated exactly with [`ray_pow`].
pub fn calculate_compounded_interest(
    rate: U256,
    elapsed: u64,
    taylor_max_elapsed: u64,
) -> Result<U256> {
    if elapsed == 0 {
        return Ok(RAY);
    }

    let rate_per_second = rate / U256::from(SECONDS_PER_YEAR);

    if elapsed > taylor_max_elapsed {
        let base = checked_add("compounded_interest", RAY, rate_per_second)?;
        return ray_pow(base, elapsed);
    }

    taylor_compounded(rate_per_second, elapsed)
}

fn taylor_compounded(rate_per_second: U256, elapsed: u64) -> Result<U256> {
    const OP: &str = "taylor_compounded";

    let n = U256::from(elapsed);
    let n_minus_one = U256::from(elapsed - 1);
    let n_minus_two = U256::from(elapsed.saturating_sub(2));

    let base_power_two = ray_mul(rate_per_second, rate_per_second)?;
    let base_power_three = ray_mul(base_power_two, rate_per_second)?;

    let first_term = checked_mul(OP, rate_per_second, n)?;

    let pairs = checked_mul(OP, n, n_minus_one)?;
    let second_term = checked_mul(OP, pairs, base_power_two)? / U256::from(2);

    let triples = checked_mul(OP, pairs, n_minus_two)?;
    let third_term = checked_mul(OP, triples, base_power_three)? / U256::from(6);

    let sum = checked_add(OP, RAY, first_term)?;
    let sum = checked_add(OP, sum, second_term)?;
    checked_add(OP, sum, third_term)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(numerator: u64, denominator: u64) -> U256 {
        RAY * U256::from(numerator) / U256::from(denominator)
    }

    #[test]
    fn test_constants() {
        assert_eq!(RAY, U256::from(10u64).pow(U256::from(27)));
        assert_eq!(HALF_RAY * U256::from(2), RAY);
        assert_eq!(WAD * WAD_RAY_RATIO, RAY);
        assert_eq!(HALF_WAD * U256::from(2), WAD);
    }

    #[test]
    fn test_ray_mul() {
        assert_eq!(ray_mul(ray(3, 2), ray(2, 1)).unwrap(), ray(3, 1));
        assert_eq!(ray_mul(U256::ZERO, U256::MAX).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_ray_mul_rounds_half_up() {
        // 1 * 0.5 = 0.5 -> rounds up to 1
        assert_eq!(ray_mul(U256::from(1), HALF_RAY).unwrap(), U256::from(1));
        // 1 * (0.5 - 1e-27) -> rounds down to 0
        assert_eq!(
            ray_mul(U256::from(1), HALF_RAY - U256::from(1)).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn test_ray_mul_overflow() {
        let result = ray_mul(U256::MAX, U256::from(2));
        assert!(matches!(
            result,
            Err(EngineError::ArithmeticOverflow { operation: "ray_mul", .. })
        ));
    }

    #[test]
    fn test_ray_div() {
        assert_eq!(ray_div(ray(3, 1), ray(2, 1)).unwrap(), ray(3, 2));
        // 2 / 3 = 0.666...67 in ray
        let two_thirds = ray_div(U256::from(2), U256::from(3)).unwrap();
        assert_eq!(two_thirds, ray(2, 3) + U256::from(1));
    }

    #[test]
    fn test_ray_div_by_zero() {
        let result = ray_div(RAY, U256::ZERO);
        assert!(matches!(
            result,
            Err(EngineError::DivisionByZero { operation: "ray_div", .. })
        ));
    }

    #[test]
    fn test_wad_mul_and_div() {
        let one_and_half = WAD + HALF_WAD;
        assert_eq!(wad_mul(one_and_half, U256::from(2) * WAD).unwrap(), U256::from(3) * WAD);
        assert_eq!(wad_div(U256::from(3) * WAD, one_and_half).unwrap(), U256::from(2) * WAD);
        assert!(matches!(
            wad_div(WAD, U256::ZERO),
            Err(EngineError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_percent_mul() {
        // 80% of 1000
        assert_eq!(
            percent_mul(U256::from(1000), U256::from(8000)).unwrap(),
            U256::from(800)
        );
        // 0.5 rounds up
        assert_eq!(
            percent_mul(U256::from(1), HALF_PERCENT).unwrap(),
            U256::from(1)
        );
        assert!(percent_mul(U256::MAX, U256::from(2)).is_err());
    }

    #[test]
    fn test_percent_div() {
        assert_eq!(
            percent_div(U256::from(800), U256::from(8000)).unwrap(),
            U256::from(1000)
        );
        assert!(matches!(
            percent_div(U256::from(1), U256::ZERO),
            Err(EngineError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_ray_wad_rescaling() {
        assert_eq!(ray_to_wad(RAY).unwrap(), WAD);
        assert_eq!(wad_to_ray(WAD).unwrap(), RAY);
        // 0.5e-18 rounds up
        assert_eq!(ray_to_wad(U256::from(500_000_000u64)).unwrap(), U256::from(1));
        assert_eq!(ray_to_wad(U256::from(499_999_999u64)).unwrap(), U256::ZERO);
        assert!(wad_to_ray(U256::MAX).is_err());
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(
            mul_div(U256::from(7), U256::from(3), U256::from(2)).unwrap(),
            U256::from(10)
        );
        assert!(mul_div(U256::from(7), U256::from(3), U256::ZERO).is_err());
    }

    #[test]
    fn test_mul_div_up() {
        assert_eq!(
            mul_div_up(U256::from(7), U256::from(3), U256::from(2)).unwrap(),
            U256::from(11)
        );
        assert_eq!(
            mul_div_up(U256::from(8), U256::from(3), U256::from(2)).unwrap(),
            U256::from(12)
        );
        assert_eq!(mul_div_up(U256::from(1), WAD / U256::from(2), WAD).unwrap(), U256::from(1));
        assert!(mul_div_up(U256::from(7), U256::from(3), U256::ZERO).is_err());
    }

    #[test]
    fn test_ray_pow() {
        assert_eq!(ray_pow(ray(2, 1), 10).unwrap(), ray(1024, 1));
        assert_eq!(ray_pow(ray(3, 1), 0).unwrap(), RAY);
        assert_eq!(ray_pow(ray(3, 1), 1).unwrap(), ray(3, 1));
    }

    #[test]
    fn test_linear_interest_one_year() {
        let factor = calculate_linear_interest(ray(1, 10), SECONDS_PER_YEAR).unwrap();
        assert_eq!(factor, ray(11, 10));
        assert_eq!(calculate_linear_interest(ray(1, 10), 0).unwrap(), RAY);
    }

    #[test]
    fn test_compounded_interest_zero_elapsed() {
        assert_eq!(
            calculate_compounded_interest(ray(1, 10), 0, 86_400).unwrap(),
            RAY
        );
    }

    #[test]
    fn test_compounded_interest_exceeds_linear() {
        let rate = ray(1, 10);
        let elapsed = 30 * 86_400;
        let linear = calculate_linear_interest(rate, elapsed).unwrap();
        let taylor = calculate_compounded_interest(rate, elapsed, u64::MAX).unwrap();
        let exact = calculate_compounded_interest(rate, elapsed, 0).unwrap();
        assert!(taylor > linear);
        assert!(exact >= taylor);
    }

    #[test]
    fn test_taylor_matches_exact_within_bound() {
        // 100% annual rate over three days
        let rate = RAY;
        let elapsed = 3 * 86_400;
        let taylor = calculate_compounded_interest(rate, elapsed, u64::MAX).unwrap();
        let exact = calculate_compounded_interest(rate, elapsed, 0).unwrap();
        let diff = if exact > taylor { exact - taylor } else { taylor - exact };
        // relative error below 1e-9
        assert!(diff * U256::from(1_000_000_000u64) < exact);
    }

    #[test]
    fn test_exact_compounding_one_year() {
        // (1 + 10% / n)^n for n = seconds in a year is close to e^0.1 = 1.10517...
        let factor = calculate_compounded_interest(ray(1, 10), SECONDS_PER_YEAR, 0).unwrap();
        assert!(factor > ray(110_517, 100_000));
        assert!(factor < ray(110_518, 100_000));
    }
}
