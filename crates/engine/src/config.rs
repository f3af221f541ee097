//! Engine-wide configuration.

use serde::{Deserialize, Serialize};

use crate::configuration::MAX_BPS;
use crate::error::{EngineError, Result};

/// Default share of a user's debt that one liquidation may repay (50%)
pub const DEFAULT_CLOSE_FACTOR: u16 = 5_000;

/// Default longest gap, in seconds, compounded with the Taylor expansion (3 days)
pub const DEFAULT_TAYLOR_MAX_ELAPSED: u64 = 3 * 86_400;

/// Default maximum number of reserves in a pool
pub const DEFAULT_MAX_RESERVES: usize = 128;

/// Configuration for a [`LendingPool`](crate::pool::LendingPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum share of a debt position repaid by one liquidation (bps)
    pub close_factor: u16,
    /// Accrual gaps up to this many seconds use the Taylor expansion;
    /// longer gaps are compounded exactly
    pub taylor_max_elapsed: u64,
    /// Maximum number of reserves the pool accepts
    pub max_reserves: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            close_factor: DEFAULT_CLOSE_FACTOR,
            taylor_max_elapsed: DEFAULT_TAYLOR_MAX_ELAPSED,
            max_reserves: DEFAULT_MAX_RESERVES,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the liquidation close factor (bps).
    pub fn with_close_factor(mut self, close_factor: u16) -> Self {
        self.close_factor = close_factor;
        self
    }

    /// Set the longest gap compounded with the Taylor expansion.
    pub fn with_taylor_max_elapsed(mut self, seconds: u64) -> Self {
        self.taylor_max_elapsed = seconds;
        self
    }

    /// Set the maximum number of reserves.
    pub fn with_max_reserves(mut self, max_reserves: usize) -> Self {
        self.max_reserves = max_reserves;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.close_factor == 0 || self.close_factor > MAX_BPS {
            return Err(EngineError::InvalidConfiguration {
                reason: format!(
                    "close factor {} must be within (0, {MAX_BPS}]",
                    self.close_factor
                ),
            });
        }
        if self.max_reserves == 0 {
            return Err(EngineError::InvalidConfiguration {
                reason: "max reserves must be positive".to_string(),
            });
        }
        Ok(())
    }
}
