//! Price oracle seam.
//!
//! The engine reads USD prices (wad, 18 decimals) through [`PriceOracle`]. A
//! failed lookup or a zero price aborts the operation being evaluated with
//! [`EngineError::OraclePriceUnavailable`]; nothing is cached between calls.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::error::{EngineError, Result};

/// Failure reported by a price source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The source has no price for the asset
    #[error("no price source for asset {0}")]
    NoSource(Address),

    /// The source could not produce a price
    #[error("{0}")]
    Source(String),
}

/// A source of asset prices in USD.
pub trait PriceOracle {
    /// Price of one whole unit of `asset` in USD, scaled by 1e18.
    fn get_asset_price(&self, asset: Address) -> std::result::Result<U256, OracleError>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for &T {
    fn get_asset_price(&self, asset: Address) -> std::result::Result<U256, OracleError> {
        (**self).get_asset_price(asset)
    }
}

/// Fetches a usable price, mapping failures and zero prices to engine errors.
pub(crate) fn fetch_price(oracle: &dyn PriceOracle, asset: Address) -> Result<U256> {
    match oracle.get_asset_price(asset) {
        Ok(price) if price.is_zero() => Err(EngineError::OraclePriceUnavailable {
            asset,
            reason: "price is zero".to_string(),
        }),
        Ok(price) => Ok(price),
        Err(err) => Err(EngineError::OraclePriceUnavailable {
            asset,
            reason: err.to_string(),
        }),
    }
}

/// Fixed price table, set by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<Address, U256>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder variant of [`set_price`](Self::set_price).
    pub fn with_price(mut self, asset: Address, price: U256) -> Self {
        self.set_price(asset, price);
        self
    }

    pub fn set_price(&mut self, asset: Address, price: U256) {
        self.prices.insert(asset, price);
    }

    pub fn remove_price(&mut self, asset: Address) -> Option<U256> {
        self.prices.remove(&asset)
    }
}

impl PriceOracle for StaticPriceOracle {
    fn get_asset_price(&self, asset: Address) -> std::result::Result<U256, OracleError> {
        self.prices
            .get(&asset)
            .copied()
            .ok_or(OracleError::NoSource(asset))
    }
}

/// Reads from a primary source and falls back to a secondary one when the
/// primary fails or reports zero.
#[derive(Debug, Clone)]
pub struct FallbackPriceOracle<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P, F> FallbackPriceOracle<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: PriceOracle, F: PriceOracle> PriceOracle for FallbackPriceOracle<P, F> {
    fn get_asset_price(&self, asset: Address) -> std::result::Result<U256, OracleError> {
        match self.primary.get_asset_price(asset) {
            Ok(price) if !price.is_zero() => Ok(price),
            _ => self.fallback.get_asset_price(asset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;

    fn dai() -> Address {
        Address::repeat_byte(0xda)
    }

    #[test]
    fn test_static_oracle() {
        let oracle = StaticPriceOracle::new().with_price(dai(), WAD);
        assert_eq!(oracle.get_asset_price(dai()).unwrap(), WAD);
        assert_eq!(
            oracle.get_asset_price(Address::ZERO),
            Err(OracleError::NoSource(Address::ZERO))
        );
    }

    #[test]
    fn test_fetch_price_maps_errors() {
        let oracle = StaticPriceOracle::new().with_price(dai(), U256::ZERO);
        assert!(matches!(
            fetch_price(&oracle, dai()),
            Err(EngineError::OraclePriceUnavailable { .. })
        ));
        assert!(matches!(
            fetch_price(&oracle, Address::ZERO),
            Err(EngineError::OraclePriceUnavailable { .. })
        ));
    }

    #[test]
    fn test_fallback_oracle() {
        let primary = StaticPriceOracle::new().with_price(dai(), U256::ZERO);
        let fallback = StaticPriceOracle::new()
            .with_price(dai(), WAD)
            .with_price(Address::ZERO, U256::from(2) * WAD);
        let oracle = FallbackPriceOracle::new(primary, fallback);

        assert_eq!(oracle.get_asset_price(dai()).unwrap(), WAD);
        assert_eq!(oracle.get_asset_price(Address::ZERO).unwrap(), U256::from(2) * WAD);
    }

    #[test]
    fn test_fallback_prefers_primary() {
        let primary = StaticPriceOracle::new().with_price(dai(), U256::from(3) * WAD);
        let fallback = StaticPriceOracle::new().with_price(dai(), WAD);
        let oracle = FallbackPriceOracle::new(primary, fallback);
        assert_eq!(oracle.get_asset_price(dai()).unwrap(), U256::from(3) * WAD);
    }
}
