//! Error types for inspection rows.

use alloy_primitives::U256;
use lendpool_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while building inspection rows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// A value does not fit in a `Decimal`, even without fractional digits
    #[error("Value {value} with scale {scale} does not fit in a decimal")]
    ValueOutOfRange { value: U256, scale: u32 },

    /// Reading from the pool failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type alias for inspection operations.
pub type Result<T> = std::result::Result<T, InspectError>;
