//! Known reserve assets and their symbols.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// A deployed reserve asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    /// Asset symbol, e.g. `DAI`
    pub symbol: String,
    /// Address of the underlying token
    pub underlying_address: Address,
    /// Address of the asset's price feed
    pub price_feed: Address,
}

/// Maps asset symbols to underlying addresses and back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    assets: Vec<AssetInfo>,
}

impl AssetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The DAI, BTCB and BUSD deployment.
    pub fn deployed() -> Self {
        Self::new()
            .with_asset(
                "DAI",
                address!("5147fBBB26AD307DBF562EE242BFA3eF44fb3145"),
                address!("E4eE17114774713d2De0eC0f035d4F7665fc025D"),
            )
            .with_asset(
                "BTCB",
                address!("37502cDeAfC39662c9F15FC2135cC5Ff4fa6Da04"),
                address!("5741306c21795FdCBb9b265Ea0255F499DFe515C"),
            )
            .with_asset(
                "BUSD",
                address!("522d378d2e1EeCeEB332b3C18D473cf00526C888"),
                address!("9331b55D9830EF609A2aBCfAc0FBCE050A52fdEa"),
            )
    }

    /// Add an asset, replacing any entry with the same symbol.
    pub fn with_asset(mut self, symbol: &str, underlying_address: Address, price_feed: Address) -> Self {
        self.assets.retain(|asset| asset.symbol != symbol);
        self.assets.push(AssetInfo {
            symbol: symbol.to_string(),
            underlying_address,
            price_feed,
        });
        self
    }

    pub fn assets(&self) -> &[AssetInfo] {
        &self.assets
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&AssetInfo> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn by_address(&self, underlying_address: Address) -> Option<&AssetInfo> {
        self.assets
            .iter()
            .find(|asset| asset.underlying_address == underlying_address)
    }

    /// Symbol of the asset with this underlying address
    pub fn symbol_of(&self, underlying_address: Address) -> Option<&str> {
        self.by_address(underlying_address)
            .map(|asset| asset.symbol.as_str())
    }
}
