//! # Market Context
//!
//! Immutable market snapshot assembled once per batch.
//!
//! ## Description
//! Holds every market input the pricer reads: spot and futures indices,
//! per-asset risk-free rate curves, volatility scores and the instrument
//! mark table. `as_of` anchors all time-dependent quantities (days to
//! expiry, futures carry) so that a batch is a pure function of its
//! snapshot.

use crate::asset::UnderlyingAsset;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk-free rate for a given expiry (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub expiry: i64,
    pub rate: f64,
}

/// Mark price and implied volatility of one listed option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMark {
    pub mark_price: f64,
    pub mark_iv: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    /// Snapshot time, unix seconds.
    pub as_of: i64,
    /// Spot index keyed by ticker ("BTC", "ETH", "USDC").
    pub spot_indices: BTreeMap<String, f64>,
    pub futures_indices: BTreeMap<UnderlyingAsset, f64>,
    #[serde(default)]
    pub risk_free_rates: BTreeMap<UnderlyingAsset, Vec<RatePoint>>,
    #[serde(default)]
    pub volatility_scores: BTreeMap<UnderlyingAsset, f64>,
    /// Keyed by instrument name, e.g. `BTC-26DEC25-100000-C`.
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentMark>,
}

impl MarketContext {
    pub fn spot(&self, key: &str) -> Result<f64, ModelError> {
        self.spot_indices
            .get(key)
            .copied()
            .ok_or_else(|| ModelError::MissingSpot(key.to_string()))
    }

    pub fn underlying_spot(&self, asset: UnderlyingAsset) -> Result<f64, ModelError> {
        self.spot(asset.ticker())
    }

    pub fn futures_index(&self, asset: UnderlyingAsset) -> Result<f64, ModelError> {
        self.futures_indices
            .get(&asset)
            .copied()
            .ok_or_else(|| ModelError::MissingFutures(asset.to_string()))
    }

    /// Volatility score, zero when the feed has none for `asset`.
    pub fn volatility_score(&self, asset: UnderlyingAsset) -> f64 {
        self.volatility_scores.get(&asset).copied().unwrap_or(0.0)
    }

    pub fn rate_curve(&self, asset: UnderlyingAsset) -> &[RatePoint] {
        self.risk_free_rates.get(&asset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn instrument(&self, name: &str) -> Option<&InstrumentMark> {
        self.instruments.get(name)
    }
}
