//! Inspection rows for lending pool state.
//!
//! This crate turns the engine's read results into human-readable,
//! serializable rows: one per reserve (indices, rates and the risk
//! parameters sliced from the packed configuration word) and one per user
//! account (collateral, debt, borrowing power and health factor).

mod assets;
mod error;
mod types;

pub use assets::{AssetInfo, AssetRegistry};
pub use error::{InspectError, Result};
pub use types::*;
