//! Kinked (two-slope) interest rate model.
//!
//! Borrow rates follow a piecewise-linear curve with a breakpoint at the
//! optimal utilization:
//!
//! ```text
//! If utilization <= optimal:
//!     rate = base + slope1 * utilization / optimal
//! If utilization > optimal:
//!     rate = base + slope1 + slope2 * (utilization - optimal) / (1 - optimal)
//! ```
//!
//! The curve keeps rates low below the optimal utilization and rises sharply
//! above it, which discourages draining a reserve's liquidity. Lenders earn
//! the borrow rate scaled by utilization, minus the reserve factor.
//!
//! All parameters and rates are annualized rays.
//!
//! # Example
//!
//! ```rust
//! use lendpool_engine::irm::InterestRateParams;
//! use lendpool_engine::math::RAY;
//! use alloy_primitives::U256;
//!
//! let params = InterestRateParams {
//!     utilization_optimal: RAY * U256::from(8) / U256::from(10),
//!     base_borrow_rate: U256::ZERO,
//!     slope1: RAY * U256::from(4) / U256::from(100),
//!     slope2: RAY * U256::from(75) / U256::from(100),
//! };
//!
//! // 900 borrowed out of 1000 puts the reserve above the kink
//! let rates = params
//!     .calculate_interest_rates(U256::from(900), U256::from(100), 1000)
//!     .unwrap();
//! assert_eq!(rates.borrow_rate, RAY * U256::from(415) / U256::from(1000));
//! ```

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::configuration::MAX_BPS;
use crate::error::{EngineError, Result};
use crate::math::{checked_add, checked_sub, percent_mul, ray_div, ray_mul, RAY};

/// Parameters of the kinked interest rate curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRateParams {
    /// Utilization at the kink (ray, strictly between 0 and 1)
    pub utilization_optimal: U256,
    /// Borrow rate at zero utilization (ray)
    pub base_borrow_rate: U256,
    /// Rate increase from zero to optimal utilization (ray)
    pub slope1: U256,
    /// Rate increase from optimal to full utilization (ray)
    pub slope2: U256,
}

/// Rates produced by the interest rate model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestRates {
    /// Utilization the rates were computed at (ray)
    pub utilization: U256,
    /// Annual borrow rate (ray)
    pub borrow_rate: U256,
    /// Annual liquidity rate paid to lenders (ray)
    pub liquidity_rate: U256,
}

impl InterestRateParams {
    /// Checks that the optimal utilization lies strictly between 0 and 1 ray.
    pub fn validate(&self) -> Result<()> {
        if self.utilization_optimal.is_zero() || self.utilization_optimal >= RAY {
            return Err(EngineError::InvalidConfiguration {
                reason: format!(
                    "optimal utilization {} must be strictly between 0 and {RAY}",
                    self.utilization_optimal
                ),
            });
        }
        Ok(())
    }

    /// Borrow rate at the given utilization.
    pub fn borrow_rate(&self, utilization: U256) -> Result<U256> {
        check_utilization(utilization)?;

        if utilization <= self.utilization_optimal {
            let ratio = ray_div(utilization, self.utilization_optimal)?;
            checked_add("borrow_rate", self.base_borrow_rate, ray_mul(self.slope1, ratio)?)
        } else {
            self.excess_borrow_rate(utilization)
        }
    }

    /// Upper branch of the curve, `base + slope1 + slope2 * excess`.
    fn excess_borrow_rate(&self, utilization: U256) -> Result<U256> {
        let excess = checked_sub("borrow_rate", utilization, self.utilization_optimal)?;
        let span = checked_sub("borrow_rate", RAY, self.utilization_optimal)?;
        let ratio = ray_div(excess, span)?;
        let rate = checked_add("borrow_rate", self.base_borrow_rate, self.slope1)?;
        checked_add("borrow_rate", rate, ray_mul(self.slope2, ratio)?)
    }

    /// Borrow and liquidity rates for a reserve's totals.
    ///
    /// `liquidity_rate = borrow_rate * utilization * (1 - reserve_factor)`
    pub fn calculate_interest_rates(
        &self,
        total_borrows: U256,
        available_liquidity: U256,
        reserve_factor: u16,
    ) -> Result<InterestRates> {
        let utilization = get_utilization(total_borrows, available_liquidity)?;
        let borrow_rate = self.borrow_rate(utilization)?;

        let lender_share = U256::from(MAX_BPS.saturating_sub(reserve_factor));
        let liquidity_rate = percent_mul(ray_mul(borrow_rate, utilization)?, lender_share)?;

        Ok(InterestRates {
            utilization,
            borrow_rate,
            liquidity_rate,
        })
    }

    /// Utilization that produces the given borrow rate.
    ///
    /// This is the inverse of [`InterestRateParams::borrow_rate`], clamped to
    /// `[0, RAY]`. On a flat segment (zero slope) the lowest utilization of
    /// that segment is returned.
    pub fn utilization_at_borrow_rate(&self, borrow_rate: U256) -> Result<U256> {
        if borrow_rate <= self.base_borrow_rate {
            return Ok(U256::ZERO);
        }

        let kink_rate = checked_add("utilization_at_borrow_rate", self.base_borrow_rate, self.slope1)?;

        if borrow_rate <= kink_rate {
            if self.slope1.is_zero() {
                return Ok(U256::ZERO);
            }
            // utilization = optimal * (rate - base) / slope1
            let ratio = ray_div(borrow_rate - self.base_borrow_rate, self.slope1)?;
            return ray_mul(ratio, self.utilization_optimal);
        }

        if self.slope2.is_zero() {
            return Ok(self.utilization_optimal);
        }

        // utilization = optimal + (1 - optimal) * (rate - kink_rate) / slope2
        let ratio = ray_div(borrow_rate - kink_rate, self.slope2)?;
        let excess = ray_mul(ratio, RAY - self.utilization_optimal)?;
        Ok(checked_add("utilization_at_borrow_rate", self.utilization_optimal, excess)?.min(RAY))
    }

    /// Liquidity change needed to move the borrow rate to `target_borrow_rate`.
    ///
    /// Returns `(supply_needed, withdrawable)`; at most one of them is non-zero.
    /// A target at or below the base rate needs unbounded supply and returns
    /// `U256::MAX` as the supply amount.
    pub fn liquidity_for_borrow_rate(
        &self,
        total_borrows: U256,
        available_liquidity: U256,
        target_borrow_rate: U256,
    ) -> Result<(U256, U256)> {
        let target_utilization = self.utilization_at_borrow_rate(target_borrow_rate)?;
        if target_utilization.is_zero() {
            return Ok((U256::MAX, U256::ZERO));
        }

        let total_liquidity = checked_add("liquidity_for_borrow_rate", total_borrows, available_liquidity)?;
        let required = ray_div(total_borrows, target_utilization)?;

        if required > total_liquidity {
            Ok((required - total_liquidity, U256::ZERO))
        } else {
            let withdrawable = total_liquidity - required;
            Ok((U256::ZERO, withdrawable.min(available_liquidity)))
        }
    }
}

/// Utilization of a reserve, `total_borrows / (total_borrows + available_liquidity)`.
///
/// Returns zero for an empty reserve.
pub fn get_utilization(total_borrows: U256, available_liquidity: U256) -> Result<U256> {
    let total = checked_add("utilization", total_borrows, available_liquidity)?;
    if total.is_zero() {
        return Ok(U256::ZERO);
    }
    let utilization = ray_div(total_borrows, total)?;
    check_utilization(utilization)?;
    Ok(utilization)
}

fn check_utilization(utilization: U256) -> Result<()> {
    if utilization > RAY {
        return Err(EngineError::InvalidUtilization { utilization });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(numerator: u64, denominator: u64) -> U256 {
        RAY * U256::from(numerator) / U256::from(denominator)
    }

    fn dai_params() -> InterestRateParams {
        InterestRateParams {
            utilization_optimal: ray(8, 10),
            base_borrow_rate: U256::ZERO,
            slope1: ray(4, 100),
            slope2: ray(75, 100),
        }
    }

    #[test]
    fn test_utilization() {
        assert_eq!(
            get_utilization(U256::from(800), U256::from(200)).unwrap(),
            ray(8, 10)
        );
        assert_eq!(get_utilization(U256::ZERO, U256::ZERO).unwrap(), U256::ZERO);
        assert_eq!(get_utilization(U256::from(5), U256::ZERO).unwrap(), RAY);
    }

    #[test]
    fn test_borrow_rate_at_kink() {
        let rate = dai_params().borrow_rate(ray(8, 10)).unwrap();
        assert_eq!(rate, ray(4, 100));
    }

    #[test]
    fn test_borrow_rate_above_kink() {
        // 0.04 + 0.75 * 0.5
        let rate = dai_params().borrow_rate(ray(9, 10)).unwrap();
        assert_eq!(rate, ray(415, 1000));
    }

    #[test]
    fn test_borrow_rate_below_kink() {
        // 0.04 * 0.4 / 0.8
        let rate = dai_params().borrow_rate(ray(4, 10)).unwrap();
        assert_eq!(rate, ray(2, 100));
    }

    #[test]
    fn test_borrow_rate_full_utilization() {
        let rate = dai_params().borrow_rate(RAY).unwrap();
        assert_eq!(rate, ray(79, 100));
    }

    #[test]
    fn test_curve_continuous_at_kink() {
        let params = InterestRateParams {
            utilization_optimal: ray(6, 10),
            base_borrow_rate: ray(1, 100),
            slope1: ray(1, 100),
            slope2: RAY,
        };
        let lower = params.borrow_rate(params.utilization_optimal).unwrap();
        let upper = params.excess_borrow_rate(params.utilization_optimal).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_borrow_rate_invalid_utilization() {
        let result = dai_params().borrow_rate(RAY + U256::from(1));
        assert!(matches!(result, Err(EngineError::InvalidUtilization { .. })));
    }

    #[test]
    fn test_liquidity_rate_applies_reserve_factor() {
        let rates = dai_params()
            .calculate_interest_rates(U256::from(800), U256::from(200), 1000)
            .unwrap();
        assert_eq!(rates.utilization, ray(8, 10));
        assert_eq!(rates.borrow_rate, ray(4, 100));
        // 0.04 * 0.8 * 0.9
        assert_eq!(rates.liquidity_rate, ray(288, 10_000));
    }

    #[test]
    fn test_empty_reserve_rates() {
        let rates = dai_params()
            .calculate_interest_rates(U256::ZERO, U256::ZERO, 1000)
            .unwrap();
        assert_eq!(rates.utilization, U256::ZERO);
        assert_eq!(rates.borrow_rate, U256::ZERO);
        assert_eq!(rates.liquidity_rate, U256::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(dai_params().validate().is_ok());
        let zero = InterestRateParams {
            utilization_optimal: U256::ZERO,
            ..dai_params()
        };
        assert!(zero.validate().is_err());
        let full = InterestRateParams {
            utilization_optimal: RAY,
            ..dai_params()
        };
        assert!(full.validate().is_err());
    }

    #[test]
    fn test_utilization_at_borrow_rate_inverts_curve() {
        let params = dai_params();
        assert_eq!(params.utilization_at_borrow_rate(ray(4, 100)).unwrap(), ray(8, 10));
        assert_eq!(params.utilization_at_borrow_rate(ray(2, 100)).unwrap(), ray(4, 10));
        assert_eq!(params.utilization_at_borrow_rate(ray(415, 1000)).unwrap(), ray(9, 10));
        assert_eq!(params.utilization_at_borrow_rate(U256::ZERO).unwrap(), U256::ZERO);
        assert_eq!(params.utilization_at_borrow_rate(RAY).unwrap(), RAY);
    }

    #[test]
    fn test_liquidity_for_borrow_rate_needs_supply() {
        // 90% utilization, target the kink rate (80%)
        let (supply, withdraw) = dai_params()
            .liquidity_for_borrow_rate(U256::from(900), U256::from(100), ray(4, 100))
            .unwrap();
        assert_eq!(supply, U256::from(125));
        assert_eq!(withdraw, U256::ZERO);
    }

    #[test]
    fn test_liquidity_for_borrow_rate_can_withdraw() {
        // 40% utilization, target the kink rate (80%)
        let (supply, withdraw) = dai_params()
            .liquidity_for_borrow_rate(U256::from(400), U256::from(600), ray(4, 100))
            .unwrap();
        assert_eq!(supply, U256::ZERO);
        assert_eq!(withdraw, U256::from(500));
    }
}
