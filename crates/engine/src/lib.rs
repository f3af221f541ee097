//! Reserve Accounting & Risk Engine
//!
//! This crate implements the accounting core of a pooled lending protocol:
//! per-reserve interest accrual, scaled user balances, and the
//! collateralization checks that gate borrowing and trigger liquidation.
//!
//! # Overview
//!
//! - Fixed-point ray (1e27) and wad (1e18) arithmetic with round-half-up
//!   semantics and explicit overflow errors
//! - A packed 256-bit reserve configuration word and its validated codec
//! - A kinked (two-slope) interest rate model
//! - Liquidity and borrow index accrual, linear and compounded
//! - Health factor evaluation across all of a user's reserves
//! - A [`LendingPool`] owning the reserves and positions, with deposit,
//!   withdraw, borrow, repay, liquidation and admin operations
//!
//! # Example
//!
//! ```rust
//! use lendpool_engine::{
//!     presets::ReserveParams, EngineConfig, LendingPool, StaticPriceOracle, WAD,
//! };
//! use alloy_primitives::{Address, U256};
//!
//! let dai = Address::repeat_byte(0xda);
//! let user = Address::repeat_byte(0x01);
//! let params = ReserveParams::dai();
//!
//! let mut pool = LendingPool::new(EngineConfig::default()).unwrap();
//! pool.init_reserve(dai, params.configuration(), params.interest_rate_params(), 0)
//!     .unwrap();
//!
//! let oracle = StaticPriceOracle::new().with_price(dai, WAD);
//! pool.deposit(user, dai, U256::from(1_000) * WAD, 0).unwrap();
//! pool.borrow(user, dai, U256::from(500) * WAD, 0, &oracle).unwrap();
//!
//! let account = pool.get_user_account_data(user, &oracle, 0).unwrap();
//! assert_eq!(account.health_factor, U256::from(16) * WAD / U256::from(10));
//! ```

pub mod config;
pub mod configuration;
pub mod error;
pub mod health;
pub mod irm;
pub mod math;
pub mod oracle;
pub mod pool;
pub mod position;
pub mod presets;
pub mod reserve;

// Re-export commonly used types
pub use config::EngineConfig;
pub use configuration::{ReserveConfiguration, ReserveConfigurationMap, MAX_BPS};
pub use error::{EngineError, ReserveId, Result, UserId};

// Health exports
pub use health::{
    asset_value_usd, calculate_health_factor, calculate_liquidation_amounts,
    calculate_user_account_data, debt_value_usd, LiquidationAmounts, LiquidationInput,
    PositionValue, UserAccountSnapshot, HEALTH_FACTOR_LIQUIDATION_THRESHOLD,
};

// IRM exports
pub use irm::{get_utilization, InterestRateParams, InterestRates};

// Math exports
pub use math::{PERCENTAGE_FACTOR, RAY, SECONDS_PER_YEAR, WAD};

// Oracle exports
pub use oracle::{FallbackPriceOracle, OracleError, PriceOracle, StaticPriceOracle};

// Pool exports
pub use pool::{InitReserveInput, LendingPool, LiquidationCall, LiquidationOutcome};
pub use position::{UserPosition, UserReserveData};
pub use reserve::{Reserve, ReserveData, ReserveState};
