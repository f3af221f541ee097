//! Per-user, per-reserve balances.
//!
//! Balances are stored scaled: the underlying amount divided by the reserve
//! index at the time of the operation. The current balance is the scaled
//! balance multiplied by the current index, so interest accrues to every
//! position without touching it.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, ReserveId, Result, UserId};
use crate::math::{checked_add, ray_div, ray_mul};
use crate::reserve::Reserve;

/// A user's position in one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    /// The user holding this position
    pub user: UserId,
    /// The reserve's underlying asset
    pub asset: ReserveId,
    /// Supplied balance divided by the liquidity index
    pub scaled_collateral_balance: U256,
    /// Borrowed balance divided by the borrow index
    pub scaled_debt_balance: U256,
}

/// Current balances of a position, as returned to inspection tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReserveData {
    /// Supplied balance including accrued income
    pub collateral_balance: U256,
    /// Borrowed balance including accrued interest
    pub debt_balance: U256,
    /// Supplied balance divided by the liquidity index
    pub scaled_collateral_balance: U256,
    /// Borrowed balance divided by the borrow index
    pub scaled_debt_balance: U256,
}

impl UserPosition {
    /// Create an empty position
    pub fn empty(user: UserId, asset: ReserveId) -> Self {
        Self {
            user,
            asset,
            scaled_collateral_balance: U256::ZERO,
            scaled_debt_balance: U256::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scaled_collateral_balance.is_zero() && self.scaled_debt_balance.is_zero()
    }

    /// Collateral balance at the given liquidity index
    pub fn collateral_balance_at(&self, liquidity_index: U256) -> Result<U256> {
        ray_mul(self.scaled_collateral_balance, liquidity_index)
    }

    /// Debt balance at the given borrow index
    pub fn debt_balance_at(&self, borrow_index: U256) -> Result<U256> {
        ray_mul(self.scaled_debt_balance, borrow_index)
    }

    /// Collateral balance at the reserve's last accrual
    pub fn collateral_balance(&self, reserve: &Reserve) -> Result<U256> {
        self.collateral_balance_at(reserve.state.liquidity_index)
    }

    /// Debt balance at the reserve's last accrual
    pub fn debt_balance(&self, reserve: &Reserve) -> Result<U256> {
        self.debt_balance_at(reserve.state.borrow_index)
    }

    /// Balances projected to `now` without mutating the reserve.
    pub fn reserve_data(
        &self,
        reserve: &Reserve,
        now: u64,
        config: &EngineConfig,
    ) -> Result<UserReserveData> {
        Ok(UserReserveData {
            collateral_balance: self.collateral_balance_at(reserve.normalized_income(now)?)?,
            debt_balance: self.debt_balance_at(reserve.normalized_debt(now, config)?)?,
            scaled_collateral_balance: self.scaled_collateral_balance,
            scaled_debt_balance: self.scaled_debt_balance,
        })
    }

    fn insufficient_balance(&self, balance: U256, requested: U256) -> EngineError {
        EngineError::InsufficientBalance {
            user: self.user,
            asset: self.asset,
            balance,
            requested,
        }
    }

    // ==================== Position Mutations ====================

    /// Supply `amount` to the reserve as collateral.
    ///
    /// Returns the new position, the new reserve and the scaled amount minted.
    pub fn deposit(
        &self,
        reserve: &Reserve,
        amount: U256,
        now: u64,
        config: &EngineConfig,
    ) -> Result<(UserPosition, Reserve, U256)> {
        let (new_reserve, scaled) = reserve.deposit(amount, now, config)?;

        let mut new_position = *self;
        new_position.scaled_collateral_balance =
            checked_add("deposit", self.scaled_collateral_balance, scaled)?;

        Ok((new_position, new_reserve, scaled))
    }

    /// Withdraw `amount` of collateral; `U256::MAX` withdraws everything.
    ///
    /// Returns the new position, the new reserve and the amount withdrawn.
    pub fn withdraw(
        &self,
        reserve: &Reserve,
        amount: U256,
        now: u64,
        config: &EngineConfig,
    ) -> Result<(UserPosition, Reserve, U256)> {
        let accrued = reserve.accrue_interest(now, config)?;
        let balance = self.collateral_balance(&accrued)?;
        let amount = if amount == U256::MAX { balance } else { amount };
        if balance.is_zero() || amount > balance {
            return Err(self.insufficient_balance(balance, amount));
        }

        let (new_reserve, scaled) = accrued.withdraw(amount, now, config)?;

        let mut new_position = *self;
        new_position.scaled_collateral_balance = if amount == balance {
            U256::ZERO
        } else {
            self.scaled_collateral_balance
                .checked_sub(scaled)
                .ok_or_else(|| self.insufficient_balance(balance, amount))?
        };

        Ok((new_position, new_reserve, amount))
    }

    /// Borrow `amount` from the reserve.
    ///
    /// Collateral checks span every reserve and belong to the pool.
    /// Returns the new position, the new reserve and the scaled debt minted.
    pub fn borrow(
        &self,
        reserve: &Reserve,
        amount: U256,
        now: u64,
        config: &EngineConfig,
    ) -> Result<(UserPosition, Reserve, U256)> {
        let (new_reserve, scaled) = reserve.borrow(amount, now, config)?;

        let mut new_position = *self;
        new_position.scaled_debt_balance = checked_add("borrow", self.scaled_debt_balance, scaled)?;

        Ok((new_position, new_reserve, scaled))
    }

    /// Repay up to `amount` of debt; anything above the debt is not taken.
    ///
    /// Returns the new position, the new reserve and the amount repaid.
    pub fn repay(
        &self,
        reserve: &Reserve,
        amount: U256,
        now: u64,
        config: &EngineConfig,
    ) -> Result<(UserPosition, Reserve, U256)> {
        let accrued = reserve.accrue_interest(now, config)?;
        let debt = self.debt_balance(&accrued)?;
        if debt.is_zero() {
            return Err(EngineError::NoDebtInReserve {
                user: self.user,
                asset: self.asset,
            });
        }
        let amount = amount.min(debt);

        let (new_reserve, scaled) = accrued.repay(amount, now, config)?;

        let mut new_position = *self;
        new_position.scaled_debt_balance = if amount == debt {
            U256::ZERO
        } else {
            self.scaled_debt_balance
                .checked_sub(scaled)
                .ok_or(EngineError::ArithmeticOverflow {
                    operation: "repay",
                    lhs: self.scaled_debt_balance,
                    rhs: scaled,
                })?
        };

        Ok((new_position, new_reserve, amount))
    }

    /// Remove `amount` of collateral for a liquidation.
    ///
    /// `reserve` must already be accrued. The reserve totals are untouched:
    /// the scaled balance moves to the liquidator or is withdrawn separately.
    /// Returns the new position and the scaled amount removed.
    pub fn seize_collateral(&self, reserve: &Reserve, amount: U256) -> Result<(UserPosition, U256)> {
        let balance = self.collateral_balance(reserve)?;
        if amount > balance {
            return Err(self.insufficient_balance(balance, amount));
        }

        let scaled = if amount == balance {
            self.scaled_collateral_balance
        } else {
            ray_div(amount, reserve.state.liquidity_index)?.min(self.scaled_collateral_balance)
        };

        let mut new_position = *self;
        new_position.scaled_collateral_balance -= scaled;
        Ok((new_position, scaled))
    }

    /// Credit a scaled collateral balance moved from another position.
    pub fn credit_collateral(&self, scaled: U256) -> Result<UserPosition> {
        let mut new_position = *self;
        new_position.scaled_collateral_balance =
            checked_add("credit_collateral", self.scaled_collateral_balance, scaled)?;
        Ok(new_position)
    }
}
