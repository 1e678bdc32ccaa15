//! # Asset Definitions
//!
//! Underlying assets traded as options and the quote assets accepted as
//! payment or collateral.
//!
//! ## Description
//! Ledger amounts are integers scaled by the token's decimals. The helpers
//! here convert between raw integers and human units, and resolve the
//! token referenced by a request path (ticker or contract address) to a
//! [`QuoteAsset`].
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Option underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnderlyingAsset {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "ETH")]
    Eth,
}

impl UnderlyingAsset {
    pub const ALL: [UnderlyingAsset; 2] = [UnderlyingAsset::Btc, UnderlyingAsset::Eth];

    /// Resolves the 16-bit asset index carried in instrument ids.
    pub fn from_index(index: u16) -> Result<Self, ModelError> {
        match index {
            1 => Ok(Self::Btc),
            2 => Ok(Self::Eth),
            other => Err(ModelError::UnknownUnderlyingIndex(other)),
        }
    }

    pub fn index(&self) -> u16 {
        match self {
            Self::Btc => 1,
            Self::Eth => 2,
        }
    }

    /// Decimals of the wrapped token representing this asset on the ledger.
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Btc => 8,
            Self::Eth => 18,
        }
    }

    pub fn ticker(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
        }
    }
}

impl fmt::Display for UnderlyingAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for UnderlyingAsset {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" | "WBTC" => Ok(Self::Btc),
            "ETH" | "WETH" => Ok(Self::Eth),
            _ => Err(ModelError::UnknownUnderlying(s.to_string())),
        }
    }
}

/// Token accepted as premium payment or collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuoteAsset {
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "WBTC")]
    Wbtc,
    #[serde(rename = "WETH")]
    Weth,
}

impl QuoteAsset {
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Usdc => 6,
            Self::Wbtc => 8,
            Self::Weth => 18,
        }
    }

    pub fn ticker(&self) -> &'static str {
        match self {
            Self::Usdc => "USDC",
            Self::Wbtc => "WBTC",
            Self::Weth => "WETH",
        }
    }

    /// Key of the spot index that prices this token (wrapped tokens use
    /// their underlying's index).
    pub fn spot_key(&self) -> &'static str {
        match self {
            Self::Usdc => "USDC",
            Self::Wbtc => "BTC",
            Self::Weth => "ETH",
        }
    }

    /// Quote token used as collateral for a short call on `asset`.
    pub fn wrapped(asset: UnderlyingAsset) -> Self {
        match asset {
            UnderlyingAsset::Btc => Self::Wbtc,
            UnderlyingAsset::Eth => Self::Weth,
        }
    }
}

impl fmt::Display for QuoteAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for QuoteAsset {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USDC" => Ok(Self::Usdc),
            "WBTC" | "BTC" => Ok(Self::Wbtc),
            "WETH" | "ETH" => Ok(Self::Weth),
            _ => Err(ModelError::UnknownQuoteAsset(s.to_string())),
        }
    }
}

/// Maps token contract addresses onto quote assets.
///
/// # Description
/// Request paths reference tokens by address on chain. Snapshots used in
/// paper mode may use tickers directly; both forms resolve here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    #[serde(default)]
    addresses: HashMap<String, QuoteAsset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: &str, asset: QuoteAsset) -> Self {
        self.addresses.insert(address.to_ascii_lowercase(), asset);
        self
    }

    /// Resolves a request path entry to its quote asset.
    ///
    /// # Parameters
    /// * `path` - Token address (case-insensitive) or ticker
    ///
    /// # Returns
    /// The matching [`QuoteAsset`] or [`ModelError::UnknownQuoteAsset`].
    pub fn resolve(&self, path: &str) -> Result<QuoteAsset, ModelError> {
        if let Some(asset) = self.addresses.get(&path.to_ascii_lowercase()) {
            return Ok(*asset);
        }
        path.parse()
    }
}

/// Converts a raw integer amount to human units.
pub fn from_raw(raw: u128, decimals: u32) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
