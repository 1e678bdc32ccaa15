//! # Keeper Configuration
//!
//! TOML configuration schema for the keeper binary.
//!
//! ## Description
//! Every section and field is optional; omitted values take the defaults
//! below. Pricing sections deserialize straight into the library types
//! ([`FeeSchedule`], [`RiskPremiumParams`], [`SolverConfig`]).
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use anyhow::Context;
use olp_models::{AssetRegistry, QuoteAsset};
use olp_options::{FeeSchedule, PriceQuantizer, ReferenceModel, RiskPremiumParams, SolverConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub max_items: usize,
    pub interval_ms: u64,
    /// Budget after which no new batch starts.
    pub max_runtime_secs: u64,
    pub once: bool,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self { max_items: 8, interval_ms: 5_000, max_runtime_secs: 50, once: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuantizerSection {
    /// Committed when a risk premium quantizes to zero or NaN.
    pub default_risk_premium_ticks: u32,
}

impl Default for QuantizerSection {
    fn default() -> Self {
        Self { default_risk_premium_ticks: olp_options::DEFAULT_RISK_PREMIUM_TICKS }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesSection {
    pub snapshot: PathBuf,
    pub audit_log: PathBuf,
    pub commit_journal: PathBuf,
    pub cursor: PathBuf,
    pub trade_stats: PathBuf,
    /// Token address to quote asset.
    pub token_addresses: BTreeMap<String, QuoteAsset>,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("data/snapshot.json"),
            audit_log: PathBuf::from("data/audit.jsonl"),
            commit_journal: PathBuf::from("data/commits.jsonl"),
            cursor: PathBuf::from("data/cursor.json"),
            trade_stats: PathBuf::from("data/trade-stats.json"),
            token_addresses: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    pub enabled: bool,
    pub max_items: usize,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self { enabled: true, max_items: 8 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

/// Root configuration schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub batch: BatchSection,
    pub fees: FeeSchedule,
    pub risk_premium: RiskPremiumParams,
    pub quantizer: QuantizerSection,
    pub solver: SolverConfig,
    pub sources: SourcesSection,
    pub collector: CollectorSection,
    pub metrics: MetricsSection,
}

impl KeeperConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn model(&self) -> ReferenceModel {
        ReferenceModel::new(self.fees.clone(), self.risk_premium.clone())
    }

    pub fn quantizer(&self) -> PriceQuantizer {
        PriceQuantizer::with_default_ticks(self.quantizer.default_risk_premium_ticks)
    }

    pub fn registry(&self) -> AssetRegistry {
        self.sources
            .token_addresses
            .iter()
            .fold(AssetRegistry::new(), |registry, (address, asset)| registry.with_address(address, *asset))
    }
}
