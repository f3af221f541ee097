//! Error types for the reserve engine.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Identifier of a reserve: the address of its underlying asset
pub type ReserveId = Address;

/// Identifier of a user account
pub type UserId = Address;

/// Errors that can occur while operating on reserves and user positions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Risk parameters or interest rate parameters violate their invariants
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A double-width intermediate did not fit in 256 bits
    #[error("Arithmetic overflow in {operation}: lhs {lhs}, rhs {rhs}")]
    ArithmeticOverflow {
        operation: &'static str,
        lhs: U256,
        rhs: U256,
    },

    /// Division by zero
    #[error("Division by zero in {operation}: numerator {numerator}")]
    DivisionByZero {
        operation: &'static str,
        numerator: U256,
    },

    /// Utilization computed outside of [0, 1 ray]
    #[error("Invalid utilization {utilization} (must be within [0, 1e27])")]
    InvalidUtilization { utilization: U256 },

    /// Accrual was attempted with a timestamp before the last update
    #[error("Clock regression on reserve {asset}: timestamp {now} is before last update {last_update}")]
    ClockRegression {
        asset: ReserveId,
        now: u64,
        last_update: u64,
    },

    /// The price oracle failed or returned a zero price
    #[error("Oracle price unavailable for asset {asset}: {reason}")]
    OraclePriceUnavailable { asset: Address, reason: String },

    /// The operation would leave the user undercollateralized
    #[error("Insufficient collateral for user {user}: health factor would be {health_factor}")]
    InsufficientCollateral { user: UserId, health_factor: U256 },

    /// Reserve is not registered in the pool
    #[error("Reserve {asset} not found")]
    ReserveNotFound { asset: ReserveId },

    /// Reserve was already initialized
    #[error("Reserve {asset} already initialized")]
    ReserveAlreadyInitialized { asset: ReserveId },

    /// Pool holds the maximum number of reserves
    #[error("Maximum number of reserves reached: {max}")]
    TooManyReserves { max: usize },

    /// Reserve is deactivated
    #[error("Reserve {asset} is not active")]
    ReserveInactive { asset: ReserveId },

    /// Reserve is frozen (no new deposits or borrows)
    #[error("Reserve {asset} is frozen")]
    ReserveFrozen { asset: ReserveId },

    /// Borrowing is disabled on the reserve
    #[error("Borrowing is not enabled on reserve {asset}")]
    BorrowingNotEnabled { asset: ReserveId },

    /// Pool is paused
    #[error("Lending pool is paused")]
    PoolPaused,

    /// Zero amount supplied to an operation
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Not enough available liquidity in the reserve
    #[error("Insufficient liquidity in reserve {asset}: available {available}, requested {requested}")]
    InsufficientLiquidity {
        asset: ReserveId,
        available: U256,
        requested: U256,
    },

    /// User balance is lower than the requested amount
    #[error("Insufficient balance for user {user} in reserve {asset}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        user: UserId,
        asset: ReserveId,
        balance: U256,
        requested: U256,
    },

    /// User holds no debt in the reserve
    #[error("User {user} has no debt in reserve {asset}")]
    NoDebtInReserve { user: UserId, asset: ReserveId },

    /// User holds no liquidatable collateral in the reserve
    #[error("User {user} has no collateral in reserve {asset}")]
    NoCollateralInReserve { user: UserId, asset: ReserveId },

    /// Liquidation attempted on a healthy account
    #[error("Health factor {health_factor} of user {user} is not below the liquidation threshold")]
    HealthFactorNotBelowThreshold { user: UserId, health_factor: U256 },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_clock_regression() {
        let error = EngineError::ClockRegression {
            asset: Address::ZERO,
            now: 5,
            last_update: 10,
        };
        assert_eq!(
            error.to_string(),
            "Clock regression on reserve 0x0000000000000000000000000000000000000000: \
             timestamp 5 is before last update 10"
        );
    }

    #[test]
    fn test_error_display_overflow() {
        let error = EngineError::ArithmeticOverflow {
            operation: "ray_mul",
            lhs: U256::MAX,
            rhs: U256::from(2),
        };
        assert!(error.to_string().starts_with("Arithmetic overflow in ray_mul"));
    }

    #[test]
    fn test_error_display_insufficient_collateral() {
        let error = EngineError::InsufficientCollateral {
            user: Address::ZERO,
            health_factor: U256::from(42),
        };
        assert!(error.to_string().ends_with("health factor would be 42"));
    }
}
