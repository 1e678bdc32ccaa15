//! # Audit Log
//!
//! Per-request audit rows emitted after a batch is committed.
//!
//! ## Description
//! One row per priced request carrying the committed integers next to the
//! full set of intermediate pricing values. Rows are split into an open
//! queue and a close queue, in lane order, and tagged with the keeper run
//! id, the batch id and the ledger receipt.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::commit::{CommitPayload, CommitReceipt};
use anyhow::Context;
use async_trait::async_trait;
use olp_models::{Tranche, UnderlyingAsset};
use olp_options::{AuditFields, PricedBatch};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub run_id: Uuid,
    pub batch_id: Uuid,
    pub receipt: String,
    pub committed_at: i64,
    pub index: u64,
    pub account: String,
    pub is_open: bool,
    pub underlying: UnderlyingAsset,
    pub strategy: &'static str,
    pub tranche: Tranche,
    pub size: f64,
    pub mark_price_ticks: u32,
    pub risk_premium_ticks: u32,
    pub fee_usd: f64,
    #[serde(flatten)]
    pub fields: AuditFields,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditRows {
    pub open: Vec<AuditRow>,
    pub close: Vec<AuditRow>,
}

impl AuditRows {
    pub fn build(run_id: Uuid, payload: &CommitPayload, receipt: &CommitReceipt, batch: &PricedBatch) -> Self {
        let mut rows = Self::default();
        for priced in &batch.priced {
            let row = AuditRow {
                run_id,
                batch_id: payload.batch_id,
                receipt: receipt.reference.clone(),
                committed_at: receipt.committed_at,
                index: priced.request.index,
                account: priced.request.account.clone(),
                is_open: priced.request.is_open,
                underlying: priced.facts.underlying,
                strategy: priced.facts.strategy.name(),
                tranche: priced.facts.tranche,
                size: priced.size,
                mark_price_ticks: priced.mark_price.get(),
                risk_premium_ticks: priced.risk_premium.get(),
                fee_usd: priced.fee_usd,
                fields: priced.audit.clone(),
            };
            if row.is_open {
                rows.open.push(row);
            } else {
                rows.close.push(row);
            }
        }
        rows
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, receipt: &CommitReceipt, rows: &AuditRows) -> anyhow::Result<()>;
}

/// Appends one JSON object per row, tagged with its queue.
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    path: PathBuf,
}

#[derive(Serialize)]
struct QueuedRow<'a> {
    queue: &'static str,
    #[serde(flatten)]
    row: &'a AuditRow,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn emit(&self, _receipt: &CommitReceipt, rows: &AuditRows) -> anyhow::Result<()> {
        let mut buf = String::new();
        let queued = rows
            .open
            .iter()
            .map(|row| QueuedRow { queue: "open", row })
            .chain(rows.close.iter().map(|row| QueuedRow { queue: "close", row }));
        for entry in queued {
            buf.push_str(&serde_json::to_string(&entry)?);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Logs a summary line per row.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, receipt: &CommitReceipt, rows: &AuditRows) -> anyhow::Result<()> {
        for (queue, row) in rows
            .open
            .iter()
            .map(|r| ("open", r))
            .chain(rows.close.iter().map(|r| ("close", r)))
        {
            info!(
                "[AUDIT] {} #{} {} {} size={:.6} mark={} rp={} receipt={}",
                queue,
                row.index,
                row.fields.instrument_name,
                row.strategy,
                row.size,
                row.mark_price_ticks,
                row.risk_premium_ticks,
                receipt.reference
            );
        }
        Ok(())
    }
}
