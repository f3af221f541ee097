//! Reserve risk parameters and their packed configuration word.
//!
//! Internally a reserve's risk parameters are a plain [`ReserveConfiguration`]
//! record. The packed [`ReserveConfigurationMap`] word exists for the read
//! boundary, where inspection tooling slices the word by bit offset:
//!
//! | Bits  | Field                  |
//! |-------|------------------------|
//! | 0-15  | LTV (bps)              |
//! | 16-31 | Liquidation threshold  |
//! | 32-47 | Liquidation bonus      |
//! | 48-55 | Decimals               |
//! | 56    | Active flag            |
//! | 57    | Frozen flag            |
//! | 58    | Borrowing enabled flag |
//! | 64-79 | Reserve factor (bps)   |
//!
//! All other bits are reserved and must be zero.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// 100% in basis points
pub const MAX_BPS: u16 = 10_000;

const LTV_OFFSET: usize = 0;
const LIQUIDATION_THRESHOLD_OFFSET: usize = 16;
const LIQUIDATION_BONUS_OFFSET: usize = 32;
const DECIMALS_OFFSET: usize = 48;
const FLAGS_OFFSET: usize = 56;
const RESERVE_FACTOR_OFFSET: usize = 64;

const ACTIVE_FLAG: u8 = 1 << 0;
const FROZEN_FLAG: u8 = 1 << 1;
const BORROWING_ENABLED_FLAG: u8 = 1 << 2;
const KNOWN_FLAGS: u8 = ACTIVE_FLAG | FROZEN_FLAG | BORROWING_ENABLED_FLAG;

/// Number of bits in use; everything above is reserved
const USED_BITS: usize = 80;

/// Risk parameters of a reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveConfiguration {
    /// Maximum borrowing power of the collateral (bps)
    pub ltv: u16,
    /// Collateral ratio at which a position becomes liquidatable (bps)
    pub liquidation_threshold: u16,
    /// Collateral premium paid to liquidators (bps, 10000 = no bonus)
    pub liquidation_bonus: u16,
    /// Decimals of the underlying asset
    pub decimals: u8,
    /// Share of borrow interest kept by the protocol (bps)
    pub reserve_factor: u16,
    pub is_active: bool,
    pub is_frozen: bool,
    pub borrowing_enabled: bool,
}

impl ReserveConfiguration {
    /// Checks the risk parameter invariants.
    ///
    /// - `ltv <= liquidation_threshold <= 10000`
    /// - `liquidation_bonus >= 10000`
    /// - `liquidation_threshold * liquidation_bonus <= 100%`, so the seized
    ///   collateral can always cover a liquidation
    /// - `reserve_factor <= 10000`
    pub fn validate(&self) -> Result<()> {
        if self.ltv > self.liquidation_threshold {
            return Err(invalid(format!(
                "ltv {} exceeds liquidation threshold {}",
                self.ltv, self.liquidation_threshold
            )));
        }
        if self.liquidation_threshold > MAX_BPS {
            return Err(invalid(format!(
                "liquidation threshold {} exceeds {MAX_BPS}",
                self.liquidation_threshold
            )));
        }
        if self.liquidation_bonus < MAX_BPS {
            return Err(invalid(format!(
                "liquidation bonus {} is below {MAX_BPS}",
                self.liquidation_bonus
            )));
        }
        let covered = u32::from(self.liquidation_threshold) * u32::from(self.liquidation_bonus);
        if covered > u32::from(MAX_BPS) * u32::from(MAX_BPS) {
            return Err(invalid(format!(
                "liquidation threshold {} with bonus {} exceeds 100%",
                self.liquidation_threshold, self.liquidation_bonus
            )));
        }
        if self.reserve_factor > MAX_BPS {
            return Err(invalid(format!(
                "reserve factor {} exceeds {MAX_BPS}",
                self.reserve_factor
            )));
        }
        Ok(())
    }

    /// Packs the configuration into its word.
    pub fn encode(&self) -> ReserveConfigurationMap {
        let mut flags = 0u8;
        if self.is_active {
            flags |= ACTIVE_FLAG;
        }
        if self.is_frozen {
            flags |= FROZEN_FLAG;
        }
        if self.borrowing_enabled {
            flags |= BORROWING_ENABLED_FLAG;
        }

        let data = (U256::from(self.ltv) << LTV_OFFSET)
            | (U256::from(self.liquidation_threshold) << LIQUIDATION_THRESHOLD_OFFSET)
            | (U256::from(self.liquidation_bonus) << LIQUIDATION_BONUS_OFFSET)
            | (U256::from(self.decimals) << DECIMALS_OFFSET)
            | (U256::from(flags) << FLAGS_OFFSET)
            | (U256::from(self.reserve_factor) << RESERVE_FACTOR_OFFSET);

        ReserveConfigurationMap { data }
    }

    /// Unpacks and validates a configuration word.
    pub fn decode(map: ReserveConfigurationMap) -> Result<Self> {
        if !(map.data >> USED_BITS).is_zero() {
            return Err(invalid(format!("reserved bits set in word {:#x}", map.data)));
        }
        let flags = map.flags();
        if flags & !KNOWN_FLAGS != 0 {
            return Err(invalid(format!("unknown flag bits {flags:#010b}")));
        }

        let config = Self {
            ltv: map.ltv(),
            liquidation_threshold: map.liquidation_threshold(),
            liquidation_bonus: map.liquidation_bonus(),
            decimals: map.decimals(),
            reserve_factor: map.reserve_factor(),
            is_active: flags & ACTIVE_FLAG != 0,
            is_frozen: flags & FROZEN_FLAG != 0,
            borrowing_enabled: flags & BORROWING_ENABLED_FLAG != 0,
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidConfiguration { reason }
}

/// A reserve configuration packed into a single 256-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReserveConfigurationMap {
    /// The packed word
    pub data: U256,
}

impl ReserveConfigurationMap {
    /// Wrap a raw word without validating it.
    pub fn new(data: U256) -> Self {
        Self { data }
    }

    fn field(&self, offset: usize, bits: usize) -> u64 {
        let mask = (U256::from(1u64) << bits) - U256::from(1u64);
        ((self.data >> offset) & mask).to::<u64>()
    }

    /// Loan to value in bps, bits 0-15
    pub fn ltv(&self) -> u16 {
        self.field(LTV_OFFSET, 16) as u16
    }

    /// Liquidation threshold in bps, bits 16-31
    pub fn liquidation_threshold(&self) -> u16 {
        self.field(LIQUIDATION_THRESHOLD_OFFSET, 16) as u16
    }

    /// Liquidation bonus in bps, bits 32-47
    pub fn liquidation_bonus(&self) -> u16 {
        self.field(LIQUIDATION_BONUS_OFFSET, 16) as u16
    }

    /// Underlying decimals, bits 48-55
    pub fn decimals(&self) -> u8 {
        self.field(DECIMALS_OFFSET, 8) as u8
    }

    /// Raw flag byte, bits 56-63
    pub fn flags(&self) -> u8 {
        self.field(FLAGS_OFFSET, 8) as u8
    }

    /// Reserve factor in bps, bits 64-79
    pub fn reserve_factor(&self) -> u16 {
        self.field(RESERVE_FACTOR_OFFSET, 16) as u16
    }

    /// Decodes the word, see [`ReserveConfiguration::decode`].
    pub fn decode(self) -> Result<ReserveConfiguration> {
        ReserveConfiguration::decode(self)
    }
}

impl From<ReserveConfiguration> for ReserveConfigurationMap {
    fn from(config: ReserveConfiguration) -> Self {
        config.encode()
    }
}
