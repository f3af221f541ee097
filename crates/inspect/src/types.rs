//! Human-readable rows for reserve and user account data.
//!
//! Fixed-point values are converted to `Decimal`: rays and indices to plain
//! ratios (1e27 is 1.0), wad USD amounts to dollars and basis points to
//! fractions. Serialized field names follow the reserve and user info tables
//! printed by deployment tooling.

use alloy_primitives::{Address, U256};
use lendpool_engine::{
    LendingPool, PriceOracle, ReserveData, UserAccountSnapshot, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assets::AssetRegistry;
use crate::error::{InspectError, Result};

/// Largest scale a `Decimal` supports
const MAX_DECIMAL_SCALE: u32 = 28;

/// Width of a `Decimal` mantissa
const MANTISSA_BITS: usize = 96;

const RAY_DECIMALS: u32 = 27;
const WAD_DECIMALS: u32 = 18;
const BPS_DECIMALS: u32 = 4;

/// Convert `value / 10^scale` to a `Decimal`.
///
/// Values too wide for the 96-bit mantissa lose their lowest fractional
/// digits (truncated toward zero) until they fit.
pub fn u256_to_decimal(value: U256, scale: u32) -> Result<Decimal> {
    let mut mantissa = value;
    let mut scale_left = scale;
    while mantissa.bit_len() > MANTISSA_BITS || scale_left > MAX_DECIMAL_SCALE {
        if scale_left == 0 {
            return Err(InspectError::ValueOutOfRange { value, scale });
        }
        mantissa /= U256::from(10u64);
        scale_left -= 1;
    }

    let mantissa = i128::try_from(mantissa.saturating_to::<u128>())
        .map_err(|_| InspectError::ValueOutOfRange { value, scale })?;
    Decimal::try_from_i128_with_scale(mantissa, scale_left)
        .map(|decimal| decimal.normalize())
        .map_err(|_| InspectError::ValueOutOfRange { value, scale })
}

/// Ray (1e27) to a ratio
pub fn ray_to_decimal(value: U256) -> Result<Decimal> {
    u256_to_decimal(value, RAY_DECIMALS)
}

/// Wad (1e18) to a ratio
pub fn wad_to_decimal(value: U256) -> Result<Decimal> {
    u256_to_decimal(value, WAD_DECIMALS)
}

/// Basis points to a fraction
pub fn bps_to_decimal(value: U256) -> Result<Decimal> {
    u256_to_decimal(value, BPS_DECIMALS)
}

/// One reserve, decoded from its [`ReserveData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveRow {
    /// Symbol, when the asset is known to the registry
    #[serde(rename = "Asset")]
    pub asset: Option<String>,
    #[serde(rename = "UnderlyingAddress")]
    pub underlying_address: Address,
    #[serde(rename = "liquidityIndex", with = "rust_decimal::serde::str")]
    pub liquidity_index: Decimal,
    #[serde(rename = "borrowIndex", with = "rust_decimal::serde::str")]
    pub borrow_index: Decimal,
    /// Annual lender rate
    #[serde(rename = "currentLiquidityRate", with = "rust_decimal::serde::str")]
    pub current_liquidity_rate: Decimal,
    /// Annual borrower rate
    #[serde(rename = "currentBorrowRate", with = "rust_decimal::serde::str")]
    pub current_borrow_rate: Decimal,
    /// Basis points
    #[serde(rename = "LTV")]
    pub ltv: u16,
    /// Basis points
    #[serde(rename = "Threshold")]
    pub threshold: u16,
    /// Basis points
    #[serde(rename = "Bonus")]
    pub bonus: u16,
    #[serde(rename = "Decimals")]
    pub decimals: u8,
    /// Basis points
    #[serde(rename = "Reserve Factor")]
    pub reserve_factor: u16,
}

impl ReserveRow {
    /// Decode a reserve's data. The risk parameters are sliced straight from
    /// the packed configuration word.
    pub fn from_reserve_data(
        underlying_address: Address,
        data: &ReserveData,
        registry: &AssetRegistry,
    ) -> Result<Self> {
        let configuration = data.configuration;
        Ok(Self {
            asset: registry.symbol_of(underlying_address).map(str::to_string),
            underlying_address,
            liquidity_index: ray_to_decimal(data.liquidity_index)?,
            borrow_index: ray_to_decimal(data.borrow_index)?,
            current_liquidity_rate: ray_to_decimal(data.current_liquidity_rate)?,
            current_borrow_rate: ray_to_decimal(data.current_borrow_rate)?,
            ltv: configuration.ltv(),
            threshold: configuration.liquidation_threshold(),
            bonus: configuration.liquidation_bonus(),
            decimals: configuration.decimals(),
            reserve_factor: configuration.reserve_factor(),
        })
    }
}

/// A row for every reserve in the pool, in initialization order.
pub fn reserve_rows(pool: &LendingPool, registry: &AssetRegistry) -> Result<Vec<ReserveRow>> {
    pool.get_reserves_list()
        .iter()
        .map(|&asset| ReserveRow::from_reserve_data(asset, &pool.get_reserve_data(asset)?, registry))
        .collect()
}

/// A user's account, decoded from its [`UserAccountSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountRow {
    /// USD
    #[serde(rename = "totalCollateralUSD", with = "rust_decimal::serde::str")]
    pub total_collateral_usd: Decimal,
    /// USD
    #[serde(rename = "totalDebtUSD", with = "rust_decimal::serde::str")]
    pub total_debt_usd: Decimal,
    /// USD
    #[serde(rename = "availableBorrowsUSD", with = "rust_decimal::serde::str")]
    pub available_borrows_usd: Decimal,
    /// Fraction, e.g. 0.8
    #[serde(with = "rust_decimal::serde::str")]
    pub current_liquidation_threshold: Decimal,
    /// Fraction, e.g. 0.75
    #[serde(with = "rust_decimal::serde::str")]
    pub ltv: Decimal,
    /// `None` when the account has no debt
    #[serde(with = "rust_decimal::serde::str_option")]
    pub health_factor: Option<Decimal>,
}

impl UserAccountRow {
    pub fn from_snapshot(snapshot: &UserAccountSnapshot) -> Result<Self> {
        let health_factor = if snapshot.health_factor == U256::MAX {
            None
        } else {
            Some(wad_to_decimal(snapshot.health_factor)?)
        };

        Ok(Self {
            total_collateral_usd: wad_to_decimal(snapshot.total_collateral_usd)?,
            total_debt_usd: wad_to_decimal(snapshot.total_debt_usd)?,
            available_borrows_usd: wad_to_decimal(snapshot.available_borrows_usd)?,
            current_liquidation_threshold: bps_to_decimal(snapshot.current_liquidation_threshold)?,
            ltv: bps_to_decimal(snapshot.ltv)?,
            health_factor,
        })
    }
}

/// The user's account row at `now`.
pub fn user_account_row(
    pool: &LendingPool,
    user: UserId,
    oracle: &dyn PriceOracle,
    now: u64,
) -> Result<UserAccountRow> {
    UserAccountRow::from_snapshot(&pool.get_user_account_data(user, oracle, now)?)
}
