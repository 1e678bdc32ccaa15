//! # Pool Risk State
//!
//! Per-batch simulation of the pool's exposure.
//!
//! ## Description
//! Greeks are tracked per tranche and underlying; utility ratios per
//! tranche. The state is loaded fresh for every batch, threaded by value
//! through the sequential pricer and dropped after commit. The ledger owns
//! the authoritative figures.

use crate::asset::UnderlyingAsset;
use crate::greeks::Greeks;
use crate::tranche::Tranche;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capital backing open positions versus total deposits, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilityRatio {
    pub utilized_usd: f64,
    pub deposited_usd: f64,
}

impl UtilityRatio {
    pub fn new(utilized_usd: f64, deposited_usd: f64) -> Self {
        Self { utilized_usd, deposited_usd }
    }

    /// utilized / deposited, capped at `max`. Zero when nothing is deposited.
    pub fn ratio(&self, max: f64) -> f64 {
        if self.deposited_usd == 0.0 {
            0.0
        } else {
            (self.utilized_usd / self.deposited_usd).min(max)
        }
    }
}

pub type UtilityRatios = BTreeMap<Tranche, UtilityRatio>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolRiskState {
    #[serde(default)]
    greeks: BTreeMap<Tranche, BTreeMap<UnderlyingAsset, Greeks>>,
    #[serde(default)]
    utility_ratios: UtilityRatios,
}

impl PoolRiskState {
    pub fn new(
        greeks: BTreeMap<Tranche, BTreeMap<UnderlyingAsset, Greeks>>,
        utility_ratios: UtilityRatios,
    ) -> Self {
        Self { greeks, utility_ratios }
    }

    /// Greeks of `tranche` on `asset`; zero when the tranche holds nothing.
    pub fn greeks(&self, tranche: Tranche, asset: UnderlyingAsset) -> Greeks {
        self.greeks
            .get(&tranche)
            .and_then(|by_asset| by_asset.get(&asset))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_greeks(&mut self, tranche: Tranche, asset: UnderlyingAsset, greeks: Greeks) {
        self.greeks.entry(tranche).or_default().insert(asset, greeks);
    }

    pub fn utility_ratio(&self, tranche: Tranche) -> UtilityRatio {
        self.utility_ratios.get(&tranche).copied().unwrap_or_default()
    }

    pub fn utility_ratios(&self) -> &UtilityRatios {
        &self.utility_ratios
    }

    pub fn set_utility_ratios(&mut self, ratios: UtilityRatios) {
        self.utility_ratios = ratios;
    }

    /// Folds a trade's Greeks into the pool.
    ///
    /// # Parameters
    /// * `is_open` - Opens transfer the inverse exposure to the pool
    ///   (subtract); closes hand it back (add).
    pub fn apply_trade(&mut self, tranche: Tranche, asset: UnderlyingAsset, trade: &Greeks, is_open: bool) {
        let entry = self.greeks.entry(tranche).or_default().entry(asset).or_default();
        if is_open {
            *entry -= *trade;
        } else {
            *entry += *trade;
        }
    }
}
