//! The lending pool: reserve and position registries and the operations on them.
//!
//! Every mutating operation works on copies. The reserves and positions it
//! touches are staged, health checks run against the staged view, and the
//! changes are committed only once every check has passed. A rejected
//! operation leaves the pool exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::configuration::{ReserveConfiguration, ReserveConfigurationMap};
use crate::error::{EngineError, ReserveId, Result, UserId};
use crate::health::{
    asset_value_usd, calculate_liquidation_amounts, calculate_user_account_data, debt_value_usd,
    max_liquidatable_debt, LiquidationInput, PositionValue, UserAccountSnapshot,
};
use crate::irm::InterestRateParams;
use crate::oracle::{fetch_price, PriceOracle};
use crate::position::{UserPosition, UserReserveData};
use crate::reserve::{Reserve, ReserveData};

/// A reserve to register with [`LendingPool::batch_init_reserves`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReserveInput {
    pub asset: ReserveId,
    pub configuration: ReserveConfiguration,
    pub interest_rate_params: InterestRateParams,
}

/// Parameters of a liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationCall {
    pub liquidator: UserId,
    /// The undercollateralized user
    pub user: UserId,
    pub collateral_asset: ReserveId,
    pub debt_asset: ReserveId,
    /// Debt the liquidator offers to repay; capped by the close factor
    pub debt_to_cover: U256,
    /// Take the seized collateral as underlying instead of a collateral position
    pub receive_underlying: bool,
}

/// What a liquidation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationOutcome {
    /// Debt repaid, in debt reserve units
    pub debt_repaid: U256,
    /// Collateral taken from the user, in collateral reserve units
    pub collateral_seized: U256,
    /// The user's health factor before the liquidation
    pub health_factor_before: U256,
}

/// Reserves and positions touched by an operation in flight.
#[derive(Debug, Default)]
struct Staged {
    reserves: Vec<Reserve>,
    positions: Vec<UserPosition>,
}

impl Staged {
    fn reserve<'a>(&'a self, pool: &'a LendingPool, asset: ReserveId) -> Result<&'a Reserve> {
        match self.reserves.iter().find(|reserve| reserve.asset == asset) {
            Some(reserve) => Ok(reserve),
            None => pool.reserve(asset),
        }
    }

    fn position(&self, pool: &LendingPool, user: UserId, asset: ReserveId) -> UserPosition {
        self.positions
            .iter()
            .find(|position| position.user == user && position.asset == asset)
            .copied()
            .unwrap_or_else(|| pool.position(user, asset))
    }

    fn put_reserve(&mut self, reserve: Reserve) {
        match self.reserves.iter_mut().find(|staged| staged.asset == reserve.asset) {
            Some(staged) => *staged = reserve,
            None => self.reserves.push(reserve),
        }
    }

    fn put_position(&mut self, position: UserPosition) {
        match self
            .positions
            .iter_mut()
            .find(|staged| staged.user == position.user && staged.asset == position.asset)
        {
            Some(staged) => *staged = position,
            None => self.positions.push(position),
        }
    }
}

/// A lending pool holding reserves and user positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingPool {
    config: EngineConfig,
    reserves: BTreeMap<ReserveId, Reserve>,
    /// Reserve ids in initialization order
    reserves_list: Vec<ReserveId>,
    positions: BTreeMap<UserId, BTreeMap<ReserveId, UserPosition>>,
    paused: bool,
}

impl LendingPool {
    /// Create an empty pool.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reserves: BTreeMap::new(),
            reserves_list: Vec::new(),
            positions: BTreeMap::new(),
            paused: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reserve(&self, asset: ReserveId) -> Result<&Reserve> {
        self.reserves
            .get(&asset)
            .ok_or(EngineError::ReserveNotFound { asset })
    }

    /// Reserves in initialization order
    pub fn reserves(&self) -> impl Iterator<Item = &Reserve> {
        self.reserves_list
            .iter()
            .filter_map(|asset| self.reserves.get(asset))
    }

    /// The user's position in a reserve; empty if none is stored.
    pub fn position(&self, user: UserId, asset: ReserveId) -> UserPosition {
        self.positions
            .get(&user)
            .and_then(|positions| positions.get(&asset))
            .copied()
            .unwrap_or_else(|| UserPosition::empty(user, asset))
    }

    /// Every non-empty position held by the user.
    pub fn user_positions(&self, user: UserId) -> impl Iterator<Item = &UserPosition> {
        self.positions
            .get(&user)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    fn ensure_not_paused(&self) -> Result<()> {
        if self.paused {
            return Err(EngineError::PoolPaused);
        }
        Ok(())
    }

    fn commit(&mut self, staged: Staged) {
        for reserve in staged.reserves {
            self.reserves.insert(reserve.asset, reserve);
        }
        for position in staged.positions {
            let user = position.user;
            if position.is_empty() {
                if let Some(positions) = self.positions.get_mut(&user) {
                    positions.remove(&position.asset);
                    if positions.is_empty() {
                        self.positions.remove(&user);
                    }
                }
            } else {
                self.positions
                    .entry(user)
                    .or_default()
                    .insert(position.asset, position);
            }
        }
    }

    // ==================== Admin ====================

    /// Register a new reserve with unit indices at `now`.
    pub fn init_reserve(
        &mut self,
        asset: ReserveId,
        configuration: ReserveConfiguration,
        interest_rate_params: InterestRateParams,
        now: u64,
    ) -> Result<()> {
        self.batch_init_reserves(
            &[InitReserveInput {
                asset,
                configuration,
                interest_rate_params,
            }],
            now,
        )
    }

    /// Register several reserves; either all are added or none.
    pub fn batch_init_reserves(&mut self, inputs: &[InitReserveInput], now: u64) -> Result<()> {
        if self.reserves_list.len() + inputs.len() > self.config.max_reserves {
            return Err(EngineError::TooManyReserves {
                max: self.config.max_reserves,
            });
        }

        let mut seen = BTreeSet::new();
        let mut reserves = Vec::with_capacity(inputs.len());
        for input in inputs {
            if self.reserves.contains_key(&input.asset) || !seen.insert(input.asset) {
                return Err(EngineError::ReserveAlreadyInitialized { asset: input.asset });
            }
            reserves.push(Reserve::new(
                input.asset,
                input.configuration,
                input.interest_rate_params,
                now,
            )?);
        }

        for reserve in reserves {
            debug!(asset = %reserve.asset, "initialized reserve");
            self.reserves_list.push(reserve.asset);
            self.reserves.insert(reserve.asset, reserve);
        }
        Ok(())
    }

    /// Replace a reserve's risk parameters.
    pub fn set_reserve_configuration(
        &mut self,
        asset: ReserveId,
        configuration: ReserveConfiguration,
        now: u64,
    ) -> Result<()> {
        let reserve = self
            .reserve(asset)?
            .with_configuration(configuration, now, &self.config)?;
        debug!(asset = %asset, "updated reserve configuration");
        self.reserves.insert(asset, reserve);
        Ok(())
    }

    /// Replace a reserve's rate curve. Interest up to `now` accrues under the old curve.
    pub fn set_interest_rate_params(
        &mut self,
        asset: ReserveId,
        params: InterestRateParams,
        now: u64,
    ) -> Result<()> {
        let reserve = self
            .reserve(asset)?
            .with_interest_rate_params(params, now, &self.config)?;
        debug!(asset = %asset, "updated interest rate params");
        self.reserves.insert(asset, reserve);
        Ok(())
    }

    fn update_configuration(
        &mut self,
        asset: ReserveId,
        now: u64,
        update: impl FnOnce(&mut ReserveConfiguration),
    ) -> Result<()> {
        let mut configuration = self.reserve(asset)?.configuration;
        update(&mut configuration);
        self.set_reserve_configuration(asset, configuration, now)
    }

    pub fn set_reserve_active(&mut self, asset: ReserveId, active: bool, now: u64) -> Result<()> {
        self.update_configuration(asset, now, |configuration| configuration.is_active = active)
    }

    pub fn set_reserve_frozen(&mut self, asset: ReserveId, frozen: bool, now: u64) -> Result<()> {
        self.update_configuration(asset, now, |configuration| configuration.is_frozen = frozen)
    }

    pub fn set_borrowing_enabled(&mut self, asset: ReserveId, enabled: bool, now: u64) -> Result<()> {
        self.update_configuration(asset, now, |configuration| {
            configuration.borrowing_enabled = enabled;
        })
    }

    /// Pause or unpause every user operation.
    pub fn set_paused(&mut self, paused: bool) {
        debug!(paused, "set pool pause");
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ==================== Health ====================

    /// Account snapshot over the staged view, with every index projected to `now`.
    fn evaluate_account(
        &self,
        staged: &Staged,
        user: UserId,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<UserAccountSnapshot> {
        let mut values = Vec::new();
        for &asset in &self.reserves_list {
            let position = staged.position(self, user, asset);
            if position.is_empty() {
                continue;
            }
            let reserve = staged.reserve(self, asset)?;
            let configuration = &reserve.configuration;

            // Reserves with a zero liquidation threshold do not back debt
            let collateral = if configuration.liquidation_threshold == 0 {
                U256::ZERO
            } else {
                position.collateral_balance_at(reserve.normalized_income(now)?)?
            };
            let debt = position.debt_balance_at(reserve.normalized_debt(now, &self.config)?)?;
            if collateral.is_zero() && debt.is_zero() {
                continue;
            }

            let price = fetch_price(oracle, asset)?;
            values.push(PositionValue {
                asset,
                collateral_usd: asset_value_usd(collateral, price, configuration.decimals)?,
                debt_usd: debt_value_usd(debt, price, configuration.decimals)?,
                ltv: configuration.ltv,
                liquidation_threshold: configuration.liquidation_threshold,
            });
        }
        calculate_user_account_data(&values)
    }

    fn has_debt(&self, staged: &Staged, user: UserId) -> bool {
        self.reserves_list
            .iter()
            .any(|&asset| !staged.position(self, user, asset).scaled_debt_balance.is_zero())
    }

    // ==================== User Operations ====================

    /// Supply `amount` of `asset` as collateral.
    ///
    /// Returns the scaled balance minted.
    pub fn deposit(&mut self, user: UserId, asset: ReserveId, amount: U256, now: u64) -> Result<U256> {
        self.ensure_not_paused()?;
        let (position, reserve, scaled) =
            self.position(user, asset)
                .deposit(self.reserve(asset)?, amount, now, &self.config)?;

        let mut staged = Staged::default();
        staged.put_reserve(reserve);
        staged.put_position(position);
        self.commit(staged);

        debug!(user = %user, asset = %asset, amount = %amount, scaled = %scaled, "deposit");
        Ok(scaled)
    }

    /// Withdraw `amount` of `asset`; `U256::MAX` withdraws the whole balance.
    ///
    /// Rejected if the user has debt and the withdrawal would drop the
    /// health factor below 1. Returns the amount withdrawn.
    pub fn withdraw(
        &mut self,
        user: UserId,
        asset: ReserveId,
        amount: U256,
        now: u64,
        oracle: &dyn PriceOracle,
    ) -> Result<U256> {
        self.ensure_not_paused()?;
        let (position, reserve, withdrawn) =
            self.position(user, asset)
                .withdraw(self.reserve(asset)?, amount, now, &self.config)?;

        let mut staged = Staged::default();
        staged.put_reserve(reserve);
        staged.put_position(position);

        if self.has_debt(&staged, user) {
            let snapshot = self.evaluate_account(&staged, user, oracle, now)?;
            if !snapshot.is_healthy() {
                warn!(
                    user = %user,
                    asset = %asset,
                    health_factor = %snapshot.health_factor,
                    "withdraw rejected"
                );
                return Err(EngineError::InsufficientCollateral {
                    user,
                    health_factor: snapshot.health_factor,
                });
            }
        }

        self.commit(staged);
        debug!(user = %user, asset = %asset, amount = %withdrawn, "withdraw");
        Ok(withdrawn)
    }

    /// Borrow `amount` of `asset` against the user's collateral.
    ///
    /// Rejected when the user has no collateral, when the amount exceeds the
    /// borrowing power available before the borrow, or when the health factor
    /// after the borrow would be below 1. Returns the scaled debt minted.
    pub fn borrow(
        &mut self,
        user: UserId,
        asset: ReserveId,
        amount: U256,
        now: u64,
        oracle: &dyn PriceOracle,
    ) -> Result<U256> {
        self.ensure_not_paused()?;
        let reserve = self.reserve(asset)?;
        let decimals = reserve.configuration.decimals;
        let before = self.evaluate_account(&Staged::default(), user, oracle, now)?;

        let (position, reserve, scaled) =
            self.position(user, asset)
                .borrow(reserve, amount, now, &self.config)?;

        let mut staged = Staged::default();
        staged.put_reserve(reserve);
        staged.put_position(position);

        let after = self.evaluate_account(&staged, user, oracle, now)?;
        let amount_usd = debt_value_usd(amount, fetch_price(oracle, asset)?, decimals)?;
        if before.total_collateral_usd.is_zero()
            || amount_usd > before.available_borrows_usd
            || !after.is_healthy()
        {
            warn!(
                user = %user,
                asset = %asset,
                amount = %amount,
                available_borrows_usd = %before.available_borrows_usd,
                health_factor = %after.health_factor,
                "borrow rejected"
            );
            return Err(EngineError::InsufficientCollateral {
                user,
                health_factor: after.health_factor,
            });
        }

        self.commit(staged);
        debug!(user = %user, asset = %asset, amount = %amount, scaled = %scaled, "borrow");
        Ok(scaled)
    }

    /// Repay up to `amount` of the user's debt in `asset`; `U256::MAX` repays all.
    ///
    /// Returns the amount repaid.
    pub fn repay(&mut self, user: UserId, asset: ReserveId, amount: U256, now: u64) -> Result<U256> {
        self.ensure_not_paused()?;
        let (position, reserve, repaid) =
            self.position(user, asset)
                .repay(self.reserve(asset)?, amount, now, &self.config)?;

        let mut staged = Staged::default();
        staged.put_reserve(reserve);
        staged.put_position(position);
        self.commit(staged);

        debug!(user = %user, asset = %asset, amount = %repaid, "repay");
        Ok(repaid)
    }

    /// Liquidate part of an undercollateralized user's debt.
    ///
    /// The liquidator repays at most `close_factor` of the user's debt in the
    /// debt reserve and receives collateral worth the repaid debt plus the
    /// collateral reserve's liquidation bonus.
    pub fn liquidation_call(
        &mut self,
        call: LiquidationCall,
        now: u64,
        oracle: &dyn PriceOracle,
    ) -> Result<LiquidationOutcome> {
        self.ensure_not_paused()?;
        if call.debt_to_cover.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        let collateral_reserve = self.reserve(call.collateral_asset)?;
        let debt_reserve = self.reserve(call.debt_asset)?;
        collateral_reserve.ensure_active()?;
        debt_reserve.ensure_active()?;

        let before = self.evaluate_account(&Staged::default(), call.user, oracle, now)?;
        if before.is_healthy() {
            return Err(EngineError::HealthFactorNotBelowThreshold {
                user: call.user,
                health_factor: before.health_factor,
            });
        }

        let collateral_reserve = collateral_reserve.accrue_and_refresh(now, &self.config)?;
        let debt_reserve = debt_reserve.accrue_interest(now, &self.config)?;

        let debt_position = self.position(call.user, call.debt_asset);
        let debt_balance = debt_position.debt_balance(&debt_reserve)?;
        if debt_balance.is_zero() {
            return Err(EngineError::NoDebtInReserve {
                user: call.user,
                asset: call.debt_asset,
            });
        }

        let collateral_balance = self
            .position(call.user, call.collateral_asset)
            .collateral_balance(&collateral_reserve)?;
        if collateral_balance.is_zero() || collateral_reserve.configuration.liquidation_threshold == 0 {
            return Err(EngineError::NoCollateralInReserve {
                user: call.user,
                asset: call.collateral_asset,
            });
        }

        let max_debt = max_liquidatable_debt(debt_balance, self.config.close_factor)?;
        let amounts = calculate_liquidation_amounts(LiquidationInput {
            debt_to_cover: call.debt_to_cover.min(max_debt),
            user_collateral_balance: collateral_balance,
            collateral_price: fetch_price(oracle, call.collateral_asset)?,
            debt_price: fetch_price(oracle, call.debt_asset)?,
            collateral_decimals: collateral_reserve.configuration.decimals,
            debt_decimals: debt_reserve.configuration.decimals,
            liquidation_bonus: collateral_reserve.configuration.liquidation_bonus,
        })?;
        if amounts.debt_to_repay.is_zero() || amounts.collateral_to_seize.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        let mut staged = Staged::default();
        // Same-asset liquidations overwrite this with the repaid reserve
        staged.put_reserve(collateral_reserve);

        let (debt_position, debt_reserve, debt_repaid) =
            debt_position.repay(&debt_reserve, amounts.debt_to_repay, now, &self.config)?;
        staged.put_reserve(debt_reserve);
        staged.put_position(debt_position);

        let collateral_reserve = staged.reserve(self, call.collateral_asset)?.clone();
        let (collateral_position, scaled) = staged
            .position(self, call.user, call.collateral_asset)
            .seize_collateral(&collateral_reserve, amounts.collateral_to_seize)?;
        staged.put_position(collateral_position);

        if call.receive_underlying {
            let (collateral_reserve, _) =
                collateral_reserve.withdraw(amounts.collateral_to_seize, now, &self.config)?;
            staged.put_reserve(collateral_reserve);
        } else {
            let liquidator_position = staged
                .position(self, call.liquidator, call.collateral_asset)
                .credit_collateral(scaled)?;
            staged.put_position(liquidator_position);
        }

        self.commit(staged);
        warn!(
            user = %call.user,
            liquidator = %call.liquidator,
            collateral_asset = %call.collateral_asset,
            debt_asset = %call.debt_asset,
            debt_repaid = %debt_repaid,
            collateral_seized = %amounts.collateral_to_seize,
            health_factor = %before.health_factor,
            "liquidation"
        );

        Ok(LiquidationOutcome {
            debt_repaid,
            collateral_seized: amounts.collateral_to_seize,
            health_factor_before: before.health_factor,
        })
    }

    // ==================== Reads ====================

    pub fn get_reserve_data(&self, asset: ReserveId) -> Result<ReserveData> {
        Ok(self.reserve(asset)?.reserve_data())
    }

    /// The user's account snapshot at `now`.
    pub fn get_user_account_data(
        &self,
        user: UserId,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<UserAccountSnapshot> {
        self.evaluate_account(&Staged::default(), user, oracle, now)
    }

    /// Reserve ids in initialization order.
    pub fn get_reserves_list(&self) -> &[ReserveId] {
        &self.reserves_list
    }

    /// The user's balances in one reserve at `now`.
    pub fn get_user_reserve_data(
        &self,
        user: UserId,
        asset: ReserveId,
        now: u64,
    ) -> Result<UserReserveData> {
        self.position(user, asset)
            .reserve_data(self.reserve(asset)?, now, &self.config)
    }

    pub fn get_configuration(&self, asset: ReserveId) -> Result<ReserveConfigurationMap> {
        Ok(self.reserve(asset)?.configuration.encode())
    }
}
