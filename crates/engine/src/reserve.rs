//! Reserve ledger and the accrual protocol.
//!
//! A [`Reserve`] pairs a reserve's risk parameters and rate curve with its
//! mutable [`ReserveState`]. Every operation first accrues the indices up to
//! `now`, then applies its balance delta, then recomputes the rates from the
//! post-operation totals:
//!
//! 1. `elapsed = now - last_update_timestamp` (negative is a clock regression)
//! 2. `liquidity_index *= 1 + liquidity_rate * elapsed / SECONDS_PER_YEAR`
//! 3. `borrow_index *= (1 + borrow_rate / SECONDS_PER_YEAR) ^ elapsed`
//! 4. apply the deposit / withdraw / borrow / repay delta
//! 5. recompute `current_borrow_rate` and `current_liquidity_rate`
//! 6. `last_update_timestamp = now`
//!
//! User balances are stored scaled by the index at the time of the operation
//! (see [`crate::position`]), so accrual is O(1) regardless of the number of
//! users.
//!
//! Operations take `&self` and return a new `Reserve`; a failed operation
//! leaves the original untouched.
//!
//! # Example
//!
//! ```rust
//! use lendpool_engine::{presets::ReserveParams, EngineConfig, Reserve, RAY, WAD};
//! use alloy_primitives::{Address, U256};
//!
//! let params = ReserveParams::dai();
//! let config = EngineConfig::default();
//! let reserve = Reserve::new(
//!     Address::ZERO,
//!     params.configuration(),
//!     params.interest_rate_params(),
//!     0,
//! )
//! .unwrap();
//!
//! let (reserve, _) = reserve.deposit(U256::from(1_000) * WAD, 0, &config).unwrap();
//! let (reserve, _) = reserve.borrow(U256::from(800) * WAD, 0, &config).unwrap();
//!
//! // One day later the borrow index has grown
//! let accrued = reserve.accrue_interest(86_400, &config).unwrap();
//! assert!(accrued.state.borrow_index > RAY);
//! ```

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::configuration::{ReserveConfiguration, ReserveConfigurationMap};
use crate::error::{EngineError, ReserveId, Result};
use crate::irm::InterestRateParams;
use crate::math::{
    calculate_compounded_interest, calculate_linear_interest, checked_add, checked_sub,
    percent_mul, ray_div, ray_mul, zero_floor_sub, RAY,
};

/// Mutable ledger of a reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveState {
    /// Cumulative lender income index (ray, starts at 1)
    pub liquidity_index: U256,
    /// Cumulative borrower debt index (ray, starts at 1)
    pub borrow_index: U256,
    /// Annual rate earned by lenders (ray)
    pub current_liquidity_rate: U256,
    /// Annual rate paid by borrowers (ray)
    pub current_borrow_rate: U256,
    /// Outstanding debt in underlying units, `total_scaled_debt * borrow_index`
    pub total_borrows: U256,
    /// Underlying units available to withdraw or borrow
    pub available_liquidity: U256,
    /// Sum of all users' scaled debt balances
    pub total_scaled_debt: U256,
    /// Sum of all users' scaled collateral balances
    pub total_scaled_supply: U256,
    /// Reserve factor share of accrued borrow interest, in underlying units
    pub accrued_to_treasury: U256,
    /// Timestamp of the last accrual, in seconds
    pub last_update_timestamp: u64,
}

impl ReserveState {
    /// State of a freshly created reserve.
    pub fn new(timestamp: u64) -> Self {
        Self {
            liquidity_index: RAY,
            borrow_index: RAY,
            current_liquidity_rate: U256::ZERO,
            current_borrow_rate: U256::ZERO,
            total_borrows: U256::ZERO,
            available_liquidity: U256::ZERO,
            total_scaled_debt: U256::ZERO,
            total_scaled_supply: U256::ZERO,
            accrued_to_treasury: U256::ZERO,
            last_update_timestamp: timestamp,
        }
    }

    /// Total exposure of the reserve, `total_borrows + available_liquidity`.
    pub fn total_liquidity(&self) -> Result<U256> {
        checked_add("total_liquidity", self.total_borrows, self.available_liquidity)
    }
}

/// Read view of a reserve, as returned to inspection tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveData {
    /// Packed risk parameters and flags
    pub configuration: ReserveConfigurationMap,
    /// Cumulative supplier income index (ray)
    pub liquidity_index: U256,
    /// Cumulative borrower interest index (ray)
    pub borrow_index: U256,
    /// Annual supply rate (ray)
    pub current_liquidity_rate: U256,
    /// Annual borrow rate (ray)
    pub current_borrow_rate: U256,
    /// Outstanding debt as of the last update
    pub total_borrows: U256,
    /// Underlying held by the reserve and free to borrow or withdraw
    pub available_liquidity: U256,
    /// Reserve factor share of interest owed to the treasury
    pub accrued_to_treasury: U256,
    /// Timestamp of the last accrual (seconds)
    pub last_update_timestamp: u64,
}

/// A reserve: one underlying asset with its risk parameters, rate curve and ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    /// Underlying asset, which identifies the reserve
    pub asset: ReserveId,
    pub configuration: ReserveConfiguration,
    pub interest_rate_params: InterestRateParams,
    pub state: ReserveState,
}

impl Reserve {
    /// Creates a reserve with unit indices at `timestamp`.
    ///
    /// Both the configuration and the rate parameters are validated.
    pub fn new(
        asset: ReserveId,
        configuration: ReserveConfiguration,
        interest_rate_params: InterestRateParams,
        timestamp: u64,
    ) -> Result<Self> {
        configuration.validate()?;
        interest_rate_params.validate()?;

        let mut reserve = Self {
            asset,
            configuration,
            interest_rate_params,
            state: ReserveState::new(timestamp),
        };
        reserve.update_interest_rates()?;
        Ok(reserve)
    }

    /// Read view with the configuration packed into its word.
    pub fn reserve_data(&self) -> ReserveData {
        ReserveData {
            configuration: self.configuration.encode(),
            liquidity_index: self.state.liquidity_index,
            borrow_index: self.state.borrow_index,
            current_liquidity_rate: self.state.current_liquidity_rate,
            current_borrow_rate: self.state.current_borrow_rate,
            total_borrows: self.state.total_borrows,
            available_liquidity: self.state.available_liquidity,
            accrued_to_treasury: self.state.accrued_to_treasury,
            last_update_timestamp: self.state.last_update_timestamp,
        }
    }

    fn elapsed(&self, now: u64) -> Result<u64> {
        now.checked_sub(self.state.last_update_timestamp)
            .ok_or(EngineError::ClockRegression {
                asset: self.asset,
                now,
                last_update: self.state.last_update_timestamp,
            })
    }

    /// Liquidity index projected to `now`, without mutating the reserve.
    pub fn normalized_income(&self, now: u64) -> Result<U256> {
        let elapsed = self.elapsed(now)?;
        if elapsed == 0 || self.state.current_liquidity_rate.is_zero() {
            return Ok(self.state.liquidity_index);
        }
        let factor = calculate_linear_interest(self.state.current_liquidity_rate, elapsed)?;
        ray_mul(factor, self.state.liquidity_index)
    }

    /// Borrow index projected to `now`, without mutating the reserve.
    pub fn normalized_debt(&self, now: u64, config: &EngineConfig) -> Result<U256> {
        let elapsed = self.elapsed(now)?;
        if elapsed == 0 || self.state.current_borrow_rate.is_zero() {
            return Ok(self.state.borrow_index);
        }
        let factor = calculate_compounded_interest(
            self.state.current_borrow_rate,
            elapsed,
            config.taylor_max_elapsed,
        )?;
        ray_mul(factor, self.state.borrow_index)
    }

    /// Accrues interest up to `now`.
    ///
    /// Updates both indices, refreshes `total_borrows` from the scaled debt
    /// and credits the reserve factor share of the new interest to the
    /// treasury. Accruing twice with the same `now` is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ClockRegression`] if `now` is before the last update
    pub fn accrue_interest(&self, now: u64, config: &EngineConfig) -> Result<Reserve> {
        let elapsed = self.elapsed(now)?;
        let mut next = self.clone();
        if elapsed == 0 {
            return Ok(next);
        }

        let liquidity_index = self.normalized_income(now)?;
        let borrow_index = self.normalized_debt(now, config)?;

        let total_borrows = ray_mul(self.state.total_scaled_debt, borrow_index)?;
        let interest = zero_floor_sub(total_borrows, self.state.total_borrows);
        let treasury_share = percent_mul(interest, U256::from(self.configuration.reserve_factor))?;

        next.state.liquidity_index = liquidity_index;
        next.state.borrow_index = borrow_index;
        next.state.total_borrows = total_borrows;
        next.state.accrued_to_treasury =
            checked_add("accrue_interest", self.state.accrued_to_treasury, treasury_share)?;
        next.state.last_update_timestamp = now;

        debug!(
            asset = %self.asset,
            elapsed,
            liquidity_index = %liquidity_index,
            borrow_index = %borrow_index,
            interest = %interest,
            "accrued reserve interest"
        );

        Ok(next)
    }

    /// Accrues up to `now` and recomputes rates from the accrued totals.
    pub(crate) fn accrue_and_refresh(&self, now: u64, config: &EngineConfig) -> Result<Reserve> {
        let mut next = self.accrue_interest(now, config)?;
        next.update_interest_rates()?;
        Ok(next)
    }

    /// Recomputes the current rates from the reserve's totals.
    fn update_interest_rates(&mut self) -> Result<()> {
        let rates = self.interest_rate_params.calculate_interest_rates(
            self.state.total_borrows,
            self.state.available_liquidity,
            self.configuration.reserve_factor,
        )?;
        self.state.current_borrow_rate = rates.borrow_rate;
        self.state.current_liquidity_rate = rates.liquidity_rate;

        trace!(
            asset = %self.asset,
            utilization = %rates.utilization,
            borrow_rate = %rates.borrow_rate,
            liquidity_rate = %rates.liquidity_rate,
            "updated reserve rates"
        );
        Ok(())
    }

    /// Replaces the risk parameters, accruing under the old ones first.
    pub fn with_configuration(
        &self,
        configuration: ReserveConfiguration,
        now: u64,
        config: &EngineConfig,
    ) -> Result<Reserve> {
        configuration.validate()?;
        let mut next = self.accrue_interest(now, config)?;
        next.configuration = configuration;
        next.update_interest_rates()?;
        Ok(next)
    }

    /// Replaces the rate curve, accruing under the old one first.
    pub fn with_interest_rate_params(
        &self,
        params: InterestRateParams,
        now: u64,
        config: &EngineConfig,
    ) -> Result<Reserve> {
        params.validate()?;
        let mut next = self.accrue_interest(now, config)?;
        next.interest_rate_params = params;
        next.update_interest_rates()?;
        Ok(next)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if !self.configuration.is_active {
            return Err(EngineError::ReserveInactive { asset: self.asset });
        }
        Ok(())
    }

    fn ensure_not_frozen(&self) -> Result<()> {
        if self.configuration.is_frozen {
            return Err(EngineError::ReserveFrozen { asset: self.asset });
        }
        Ok(())
    }

    fn ensure_liquidity(&self, amount: U256) -> Result<()> {
        if amount > self.state.available_liquidity {
            return Err(EngineError::InsufficientLiquidity {
                asset: self.asset,
                available: self.state.available_liquidity,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Supplies `amount` of the underlying.
    ///
    /// Returns the new reserve and the scaled balance minted to the supplier.
    pub fn deposit(&self, amount: U256, now: u64, config: &EngineConfig) -> Result<(Reserve, U256)> {
        self.ensure_active()?;
        self.ensure_not_frozen()?;
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        let mut next = self.accrue_interest(now, config)?;
        let scaled = ray_div(amount, next.state.liquidity_index)?;
        if scaled.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        next.state.available_liquidity =
            checked_add("deposit", next.state.available_liquidity, amount)?;
        next.state.total_scaled_supply =
            checked_add("deposit", next.state.total_scaled_supply, scaled)?;
        next.update_interest_rates()?;

        Ok((next, scaled))
    }

    /// Withdraws `amount` of the underlying.
    ///
    /// Returns the new reserve and the scaled balance burned from the supplier.
    pub fn withdraw(&self, amount: U256, now: u64, config: &EngineConfig) -> Result<(Reserve, U256)> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }
        self.ensure_liquidity(amount)?;

        let mut next = self.accrue_interest(now, config)?;
        let scaled = ray_div(amount, next.state.liquidity_index)?;

        next.state.available_liquidity -= amount;
        next.state.total_scaled_supply = zero_floor_sub(next.state.total_scaled_supply, scaled);
        next.update_interest_rates()?;

        Ok((next, scaled))
    }

    /// Borrows `amount` of the underlying.
    ///
    /// Returns the new reserve and the scaled debt minted to the borrower.
    pub fn borrow(&self, amount: U256, now: u64, config: &EngineConfig) -> Result<(Reserve, U256)> {
        self.ensure_active()?;
        self.ensure_not_frozen()?;
        if !self.configuration.borrowing_enabled {
            return Err(EngineError::BorrowingNotEnabled { asset: self.asset });
        }
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }
        self.ensure_liquidity(amount)?;

        let mut next = self.accrue_interest(now, config)?;
        let scaled = ray_div(amount, next.state.borrow_index)?;
        if scaled.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        next.state.available_liquidity -= amount;
        next.state.total_scaled_debt = checked_add("borrow", next.state.total_scaled_debt, scaled)?;
        next.state.total_borrows = ray_mul(next.state.total_scaled_debt, next.state.borrow_index)?;
        next.update_interest_rates()?;

        Ok((next, scaled))
    }

    /// Repays `amount` of debt.
    ///
    /// Returns the new reserve and the scaled debt burned from the borrower.
    pub fn repay(&self, amount: U256, now: u64, config: &EngineConfig) -> Result<(Reserve, U256)> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount);
        }

        let mut next = self.accrue_interest(now, config)?;
        let scaled = ray_div(amount, next.state.borrow_index)?;

        next.state.available_liquidity = checked_add("repay", next.state.available_liquidity, amount)?;
        next.state.total_scaled_debt = checked_sub("repay", next.state.total_scaled_debt, scaled)?;
        next.state.total_borrows = ray_mul(next.state.total_scaled_debt, next.state.borrow_index)?;
        next.update_interest_rates()?;

        Ok((next, scaled))
    }
}
