//! Reserve parameter presets.
//!
//! [`ReserveParams`] deserializes from the reserve parameter table used by
//! deployment tooling, one entry per asset:
//!
//! ```json
//! {
//!   "baseLTVAsCollateral": 7500,
//!   "liquidationThreshold": 8000,
//!   "liquidationBonus": 10500,
//!   "borrowingEnabled": true,
//!   "reserveDecimals": 18,
//!   "reserveFactor": 1000,
//!   "utilizationOptimal": "800000000000000000000000000",
//!   "baseInterestRate": "0",
//!   "slope1": "40000000000000000000000000",
//!   "slope2": "750000000000000000000000000"
//! }
//! ```

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::configuration::ReserveConfiguration;
use crate::irm::InterestRateParams;
use crate::math::RAY;

/// Deployment parameters of one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveParams {
    #[serde(rename = "baseLTVAsCollateral")]
    pub base_ltv_as_collateral: u16,
    pub liquidation_threshold: u16,
    pub liquidation_bonus: u16,
    pub borrowing_enabled: bool,
    pub reserve_decimals: u8,
    pub reserve_factor: u16,
    /// Optimal utilization (ray)
    pub utilization_optimal: U256,
    /// Borrow rate at zero utilization (ray)
    #[serde(alias = "BaseInterstRate")]
    pub base_interest_rate: U256,
    /// Slope below the kink (ray)
    pub slope1: U256,
    /// Slope above the kink (ray)
    pub slope2: U256,
}

/// `numerator / denominator` as a ray
fn ray_ratio(numerator: u64, denominator: u64) -> U256 {
    RAY * U256::from(numerator) / U256::from(denominator)
}

impl ReserveParams {
    pub fn dai() -> Self {
        Self {
            base_ltv_as_collateral: 7500,
            liquidation_threshold: 8000,
            liquidation_bonus: 10500,
            borrowing_enabled: true,
            reserve_decimals: 18,
            reserve_factor: 1000,
            utilization_optimal: ray_ratio(8, 10),
            base_interest_rate: U256::ZERO,
            slope1: ray_ratio(4, 100),
            slope2: ray_ratio(75, 100),
        }
    }

    pub fn btcb() -> Self {
        Self {
            base_ltv_as_collateral: 7000,
            liquidation_threshold: 7500,
            liquidation_bonus: 10900,
            borrowing_enabled: true,
            reserve_decimals: 18,
            reserve_factor: 1000,
            utilization_optimal: ray_ratio(6, 10),
            base_interest_rate: U256::ZERO,
            slope1: ray_ratio(1, 100),
            slope2: RAY,
        }
    }

    pub fn busd() -> Self {
        Self {
            base_ltv_as_collateral: 7500,
            liquidation_threshold: 8000,
            liquidation_bonus: 10500,
            borrowing_enabled: true,
            reserve_decimals: 18,
            reserve_factor: 1000,
            utilization_optimal: ray_ratio(8, 10),
            base_interest_rate: U256::ZERO,
            slope1: ray_ratio(4, 100),
            slope2: RAY,
        }
    }

    /// Risk parameters of an active, unfrozen reserve.
    pub fn configuration(&self) -> ReserveConfiguration {
        ReserveConfiguration {
            ltv: self.base_ltv_as_collateral,
            liquidation_threshold: self.liquidation_threshold,
            liquidation_bonus: self.liquidation_bonus,
            decimals: self.reserve_decimals,
            reserve_factor: self.reserve_factor,
            is_active: true,
            is_frozen: false,
            borrowing_enabled: self.borrowing_enabled,
        }
    }

    pub fn interest_rate_params(&self) -> InterestRateParams {
        InterestRateParams {
            utilization_optimal: self.utilization_optimal,
            base_borrow_rate: self.base_interest_rate,
            slope1: self.slope1,
            slope2: self.slope2,
        }
    }
}

/// The default reserve table, keyed by asset symbol.
pub fn default_reserve_params() -> Vec<(&'static str, ReserveParams)> {
    vec![
        ("DAI", ReserveParams::dai()),
        ("BTCB", ReserveParams::btcb()),
        ("BUSD", ReserveParams::busd()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for (symbol, params) in default_reserve_params() {
            assert!(params.configuration().validate().is_ok(), "{symbol}");
            assert!(params.interest_rate_params().validate().is_ok(), "{symbol}");
        }
    }

    #[test]
    fn test_dai_curve() {
        let params = ReserveParams::dai().interest_rate_params();
        let kink = params.borrow_rate(ray_ratio(8, 10)).unwrap();
        assert_eq!(kink, ray_ratio(4, 100));
        let above = params.borrow_rate(ray_ratio(9, 10)).unwrap();
        assert_eq!(above, ray_ratio(415, 1000));
    }

    #[test]
    fn test_btcb_configuration() {
        let configuration = ReserveParams::btcb().configuration();
        assert_eq!(configuration.ltv, 7000);
        assert_eq!(configuration.liquidation_threshold, 7500);
        assert_eq!(configuration.liquidation_bonus, 10900);
        assert!(configuration.is_active);
    }

    #[test]
    fn test_deserialize_deployment_table() {
        let json = r#"{
            "baseLTVAsCollateral": 7500,
            "liquidationThreshold": 8000,
            "liquidationBonus": 10500,
            "borrowingEnabled": true,
            "reserveDecimals": 18,
            "reserveFactor": 1000,
            "utilizationOptimal": "800000000000000000000000000",
            "BaseInterstRate": "0",
            "slope1": "40000000000000000000000000",
            "slope2": "750000000000000000000000000"
        }"#;
        let params: ReserveParams = serde_json::from_str(json).unwrap();
        assert_eq!(params, ReserveParams::dai());
    }
}
