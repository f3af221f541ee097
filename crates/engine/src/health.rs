//! Collateralization health of a user account.
//!
//! A user's positions are converted to USD (wad-scaled) and aggregated into a
//! [`UserAccountSnapshot`]:
//!
//! - `ltv = Σ(collateral_i · ltv_i) / Σ collateral_i`
//! - `liquidation_threshold = Σ(collateral_i · lt_i) / Σ collateral_i`
//! - `health_factor = total_collateral · liquidation_threshold / total_debt`
//! - `available_borrows = total_collateral · ltv - total_debt`, floored at zero
//!
//! An account with no debt has a health factor of `U256::MAX`. Below
//! [`HEALTH_FACTOR_LIQUIDATION_THRESHOLD`] (1 wad) the account can be
//! liquidated.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ReserveId, Result};
use crate::math::{
    checked_add, checked_mul, mul_div, mul_div_up, percent_div, percent_mul, wad_div, zero_floor_sub, WAD,
};

/// Health factor below which an account is liquidatable (1 wad)
pub const HEALTH_FACTOR_LIQUIDATION_THRESHOLD: U256 = WAD;

/// One reserve's contribution to a user account, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionValue {
    pub asset: ReserveId,
    /// Collateral value (wad USD)
    pub collateral_usd: U256,
    /// Debt value (wad USD)
    pub debt_usd: U256,
    /// Reserve LTV (bps)
    pub ltv: u16,
    /// Reserve liquidation threshold (bps)
    pub liquidation_threshold: u16,
}

/// Aggregated account data, all values wad USD unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountSnapshot {
    pub total_collateral_usd: U256,
    pub total_debt_usd: U256,
    pub available_borrows_usd: U256,
    /// Weighted average liquidation threshold (bps)
    pub current_liquidation_threshold: U256,
    /// Weighted average LTV (bps)
    pub ltv: U256,
    /// Health factor (wad), `U256::MAX` without debt
    pub health_factor: U256,
}

impl UserAccountSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.health_factor >= HEALTH_FACTOR_LIQUIDATION_THRESHOLD
    }

    pub fn is_liquidatable(&self) -> bool {
        !self.is_healthy()
    }
}

/// `10^decimals` as a U256.
pub fn decimals_unit(decimals: u8) -> Result<U256> {
    let ten = U256::from(10u64);
    let exponent = U256::from(decimals);
    ten.checked_pow(exponent)
        .ok_or(EngineError::ArithmeticOverflow {
            operation: "decimals_unit",
            lhs: ten,
            rhs: exponent,
        })
}

/// USD value (wad) of `amount` units of an asset with `decimals` decimals
/// priced at `price` (wad USD per whole unit).
pub fn asset_value_usd(amount: U256, price: U256, decimals: u8) -> Result<U256> {
    mul_div(amount, price, decimals_unit(decimals)?)
}

/// Like [`asset_value_usd`] but rounding up, so any non-zero debt has a
/// non-zero value.
pub fn debt_value_usd(amount: U256, price: U256, decimals: u8) -> Result<U256> {
    mul_div_up(amount, price, decimals_unit(decimals)?)
}

/// Health factor (wad) of an account.
pub fn calculate_health_factor(
    total_collateral_usd: U256,
    total_debt_usd: U256,
    liquidation_threshold: U256,
) -> Result<U256> {
    if total_debt_usd.is_zero() {
        return Ok(U256::MAX);
    }
    wad_div(
        percent_mul(total_collateral_usd, liquidation_threshold)?,
        total_debt_usd,
    )
}

/// Additional debt (wad USD) the account may take on.
pub fn calculate_available_borrows(
    total_collateral_usd: U256,
    total_debt_usd: U256,
    ltv: U256,
) -> Result<U256> {
    Ok(zero_floor_sub(
        percent_mul(total_collateral_usd, ltv)?,
        total_debt_usd,
    ))
}

/// Aggregates per-reserve values into an account snapshot.
pub fn calculate_user_account_data(positions: &[PositionValue]) -> Result<UserAccountSnapshot> {
    let mut total_collateral = U256::ZERO;
    let mut total_debt = U256::ZERO;
    let mut weighted_ltv = U256::ZERO;
    let mut weighted_threshold = U256::ZERO;

    for position in positions {
        if !position.collateral_usd.is_zero() {
            total_collateral = checked_add("account_collateral", total_collateral, position.collateral_usd)?;
            weighted_ltv = checked_add(
                "account_ltv",
                weighted_ltv,
                checked_mul("account_ltv", position.collateral_usd, U256::from(position.ltv))?,
            )?;
            weighted_threshold = checked_add(
                "account_threshold",
                weighted_threshold,
                checked_mul(
                    "account_threshold",
                    position.collateral_usd,
                    U256::from(position.liquidation_threshold),
                )?,
            )?;
        }
        total_debt = checked_add("account_debt", total_debt, position.debt_usd)?;
    }

    let (ltv, current_liquidation_threshold) = if total_collateral.is_zero() {
        (U256::ZERO, U256::ZERO)
    } else {
        (
            weighted_ltv / total_collateral,
            weighted_threshold / total_collateral,
        )
    };

    Ok(UserAccountSnapshot {
        total_collateral_usd: total_collateral,
        total_debt_usd: total_debt,
        available_borrows_usd: calculate_available_borrows(total_collateral, total_debt, ltv)?,
        current_liquidation_threshold,
        ltv,
        health_factor: calculate_health_factor(
            total_collateral,
            total_debt,
            current_liquidation_threshold,
        )?,
    })
}

/// Inputs to size a liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationInput {
    /// Debt the liquidator covers, already capped by the close factor
    pub debt_to_cover: U256,
    /// The user's collateral balance in the collateral reserve
    pub user_collateral_balance: U256,
    /// Collateral price (wad USD)
    pub collateral_price: U256,
    /// Debt price (wad USD)
    pub debt_price: U256,
    pub collateral_decimals: u8,
    pub debt_decimals: u8,
    /// Collateral reserve liquidation bonus (bps)
    pub liquidation_bonus: u16,
}

/// Result of liquidation sizing, in underlying units of each reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationAmounts {
    pub collateral_to_seize: U256,
    pub debt_to_repay: U256,
}

/// Largest debt one liquidation may repay.
pub fn max_liquidatable_debt(debt_balance: U256, close_factor: u16) -> Result<U256> {
    percent_mul(debt_balance, U256::from(close_factor))
}

/// Sizes a liquidation.
///
/// The collateral seized is worth the covered debt raised by the liquidation
/// bonus. If the user holds less than that, all of the collateral is seized
/// and the covered debt shrinks to match.
pub fn calculate_liquidation_amounts(input: LiquidationInput) -> Result<LiquidationAmounts> {
    let collateral_unit = decimals_unit(input.collateral_decimals)?;
    let debt_unit = decimals_unit(input.debt_decimals)?;
    let bonus = U256::from(input.liquidation_bonus);

    // debt · debt_price · 10^coll_dec / (coll_price · 10^debt_dec)
    let base_collateral = mul_div(
        checked_mul("liquidation_collateral", input.debt_to_cover, input.debt_price)?,
        collateral_unit,
        checked_mul("liquidation_collateral", input.collateral_price, debt_unit)?,
    )?;
    let max_collateral = percent_mul(base_collateral, bonus)?;

    if max_collateral <= input.user_collateral_balance {
        return Ok(LiquidationAmounts {
            collateral_to_seize: max_collateral,
            debt_to_repay: input.debt_to_cover,
        });
    }

    let debt_value = mul_div(
        checked_mul(
            "liquidation_debt",
            input.user_collateral_balance,
            input.collateral_price,
        )?,
        debt_unit,
        checked_mul("liquidation_debt", input.debt_price, collateral_unit)?,
    )?;
    let debt_to_repay = percent_div(debt_value, bonus)?.min(input.debt_to_cover);

    Ok(LiquidationAmounts {
        collateral_to_seize: input.user_collateral_balance,
        debt_to_repay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn usd(amount: u64) -> U256 {
        U256::from(amount) * WAD
    }

    fn position(collateral: u64, debt: u64, ltv: u16, threshold: u16) -> PositionValue {
        PositionValue {
            asset: Address::ZERO,
            collateral_usd: usd(collateral),
            debt_usd: usd(debt),
            ltv,
            liquidation_threshold: threshold,
        }
    }

    #[test]
    fn test_health_factor_healthy() {
        let hf = calculate_health_factor(usd(1000), usd(500), U256::from(8000)).unwrap();
        assert_eq!(hf, U256::from(16) * WAD / U256::from(10));
    }

    #[test]
    fn test_health_factor_liquidatable() {
        let hf = calculate_health_factor(usd(600), usd(500), U256::from(8000)).unwrap();
        assert_eq!(hf, U256::from(96) * WAD / U256::from(100));
    }

    #[test]
    fn test_health_factor_without_debt() {
        let snapshot = calculate_user_account_data(&[position(1000, 0, 7500, 8000)]).unwrap();
        assert_eq!(snapshot.health_factor, U256::MAX);
        assert!(snapshot.is_healthy());

        let empty = calculate_user_account_data(&[]).unwrap();
        assert_eq!(empty.health_factor, U256::MAX);
        assert_eq!(empty.ltv, U256::ZERO);
    }

    #[test]
    fn test_health_factor_finite_with_debt() {
        let snapshot = calculate_user_account_data(&[position(0, 1, 7500, 8000)]).unwrap();
        assert_eq!(snapshot.health_factor, U256::ZERO);
        assert!(snapshot.is_liquidatable());
    }

    #[test]
    fn test_weighted_averages() {
        let snapshot = calculate_user_account_data(&[
            position(1000, 0, 7500, 8000),
            position(3000, 0, 7000, 7500),
            position(0, 1000, 7500, 8000),
        ])
        .unwrap();

        assert_eq!(snapshot.total_collateral_usd, usd(4000));
        assert_eq!(snapshot.total_debt_usd, usd(1000));
        // (1000 * 7500 + 3000 * 7000) / 4000
        assert_eq!(snapshot.ltv, U256::from(7125));
        // (1000 * 8000 + 3000 * 7500) / 4000
        assert_eq!(snapshot.current_liquidation_threshold, U256::from(7625));
        assert_eq!(snapshot.available_borrows_usd, usd(1850));
        assert_eq!(snapshot.health_factor, U256::from(305) * WAD / U256::from(100));
    }

    #[test]
    fn test_available_borrows_floor() {
        let available = calculate_available_borrows(usd(1000), usd(900), U256::from(7500)).unwrap();
        assert_eq!(available, U256::ZERO);
    }

    #[test]
    fn test_asset_value_usd_decimals() {
        // 1.5 units of an 8-decimal asset at 20000 USD
        let value = asset_value_usd(U256::from(150_000_000u64), usd(20_000), 8).unwrap();
        assert_eq!(value, usd(30_000));
        assert!(asset_value_usd(U256::from(1), WAD, u8::MAX).is_err());
    }

    #[test]
    fn test_dust_debt_keeps_finite_health_factor() {
        let half_dollar = WAD / U256::from(2);
        assert_eq!(asset_value_usd(U256::from(1), half_dollar, 18).unwrap(), U256::ZERO);
        let debt_usd = debt_value_usd(U256::from(1), half_dollar, 18).unwrap();
        assert_eq!(debt_usd, U256::from(1));

        let hf = calculate_health_factor(usd(1000), debt_usd, U256::from(8000)).unwrap();
        assert_ne!(hf, U256::MAX);
    }

    #[test]
    fn test_liquidation_with_bonus() {
        let amounts = calculate_liquidation_amounts(LiquidationInput {
            debt_to_cover: usd(100),
            user_collateral_balance: usd(1000),
            collateral_price: usd(2),
            debt_price: usd(1),
            collateral_decimals: 18,
            debt_decimals: 18,
            liquidation_bonus: 10500,
        })
        .unwrap();
        assert_eq!(amounts.debt_to_repay, usd(100));
        assert_eq!(amounts.collateral_to_seize, U256::from(525) * WAD / U256::from(10));
    }

    #[test]
    fn test_liquidation_capped_by_collateral() {
        let amounts = calculate_liquidation_amounts(LiquidationInput {
            debt_to_cover: usd(100),
            user_collateral_balance: usd(40),
            collateral_price: usd(2),
            debt_price: usd(1),
            collateral_decimals: 18,
            debt_decimals: 18,
            liquidation_bonus: 10500,
        })
        .unwrap();
        assert_eq!(amounts.collateral_to_seize, usd(40));
        // 80 USD of collateral covers 80 / 1.05 of debt
        assert_eq!(
            amounts.debt_to_repay,
            U256::from(76_190_476_190_476_190_476u128)
        );
    }

    #[test]
    fn test_liquidation_mixed_decimals() {
        // Repay 1000 units of a 6-decimal stable with 8-decimal collateral at 25000 USD
        let amounts = calculate_liquidation_amounts(LiquidationInput {
            debt_to_cover: U256::from(1_000_000_000u64),
            user_collateral_balance: U256::from(100_000_000u64),
            collateral_price: usd(25_000),
            debt_price: usd(1),
            collateral_decimals: 8,
            debt_decimals: 6,
            liquidation_bonus: 11000,
        })
        .unwrap();
        // 0.04 collateral units raised by 10%
        assert_eq!(amounts.collateral_to_seize, U256::from(4_400_000u64));
    }

    #[test]
    fn test_max_liquidatable_debt() {
        assert_eq!(max_liquidatable_debt(usd(100), 5000).unwrap(), usd(50));
    }
}
