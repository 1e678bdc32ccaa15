//! # Snapshot Sources
//!
//! File-backed collaborators for paper runs.
//!
//! ## Description
//! A ledger snapshot is one JSON file holding the market context, both
//! Greeks tiers, the request queue, utility ratios and historical spots.
//! The file is re-read on every call, so it can be refreshed between
//! batches by an external process. Commits go to an append-only JSONL
//! journal instead of a ledger.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use anyhow::Context;
use async_trait::async_trait;
use olp_models::{MarketContext, PositionRequest, UnderlyingAsset, UtilityRatios};
use olp_settlement::{
    CommitPayload, CommitReceipt, GreeksSource, HistoricalPriceSource, MarketContextLoader, PendingBatch,
    RequestQueue, SettlementCommitter, TrancheGreeks,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GreeksTiers {
    #[serde(default)]
    pub primary: Option<TrancheGreeks>,
    #[serde(default)]
    pub secondary: Option<TrancheGreeks>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub market: MarketContext,
    #[serde(default)]
    pub greeks: GreeksTiers,
    #[serde(default)]
    pub requests: Vec<PositionRequest>,
    #[serde(default)]
    pub utility_ratios: UtilityRatios,
    /// Spot used for trade statistics, per underlying.
    #[serde(default)]
    pub historical_spots: BTreeMap<UnderlyingAsset, f64>,
}

impl LedgerSnapshot {
    /// Greeks from the first tier present.
    pub fn greeks(&self) -> TrancheGreeks {
        self.greeks
            .primary
            .clone()
            .or_else(|| self.greeks.secondary.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> anyhow::Result<LedgerSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", self.path.display()))
    }
}

#[async_trait]
impl MarketContextLoader for SnapshotFile {
    async fn load_market_context(&self) -> anyhow::Result<MarketContext> {
        Ok(self.load().await?.market)
    }
}

#[async_trait]
impl RequestQueue for SnapshotFile {
    async fn load_pending(&self, cursor: u64, max_items: usize) -> anyhow::Result<PendingBatch> {
        let snapshot = self.load().await?;
        let end_index = snapshot.requests.iter().map(|r| r.index + 1).max().unwrap_or(0);
        let mut requests: Vec<_> = snapshot.requests.into_iter().filter(|r| r.index >= cursor).collect();
        requests.sort_by_key(|r| r.index);
        requests.truncate(max_items);
        Ok(PendingBatch { requests, utility_ratios: snapshot.utility_ratios, end_index })
    }
}

#[async_trait]
impl HistoricalPriceSource for SnapshotFile {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn spot_at(&self, asset: UnderlyingAsset, _timestamp: i64) -> anyhow::Result<f64> {
        let snapshot = self.load().await?;
        match snapshot.historical_spots.get(&asset) {
            Some(price) => Ok(*price),
            None => Ok(snapshot.market.underlying_spot(asset).unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreeksTier {
    Primary,
    Secondary,
}

/// One Greeks tier of a snapshot file; a missing tier is a failure.
#[derive(Debug, Clone)]
pub struct SnapshotGreeks {
    file: SnapshotFile,
    tier: GreeksTier,
}

impl SnapshotGreeks {
    pub fn new(file: SnapshotFile, tier: GreeksTier) -> Self {
        Self { file, tier }
    }
}

#[async_trait]
impl GreeksSource for SnapshotGreeks {
    fn name(&self) -> &str {
        match self.tier {
            GreeksTier::Primary => "snapshot-primary",
            GreeksTier::Secondary => "snapshot-secondary",
        }
    }

    async fn load_greeks(&self) -> anyhow::Result<TrancheGreeks> {
        let tiers = self.file.load().await?.greeks;
        let greeks = match self.tier {
            GreeksTier::Primary => tiers.primary,
            GreeksTier::Secondary => tiers.secondary,
        };
        greeks.ok_or_else(|| anyhow::anyhow!("{} missing from snapshot", self.name()))
    }
}

/// Appends every payload to a JSONL journal.
#[derive(Debug, Clone)]
pub struct JournalCommitter {
    path: PathBuf,
}

impl JournalCommitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettlementCommitter for JournalCommitter {
    async fn commit(&self, payload: &CommitPayload) -> anyhow::Result<CommitReceipt> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening journal {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(CommitReceipt {
            reference: format!("journal-{}", payload.batch_id),
            committed_at: chrono::Utc::now().timestamp(),
        })
    }

    fn name(&self) -> &str {
        "journal"
    }
}
