//! # Batch Executor
//!
//! One `run_batch` cycle: load, price, commit, persist, audit.
//!
//! ## Description
//! 1. Load the cursor, then up to `max_items` requests from it
//! 2. Load the market snapshot and pool Greeks (fallback chain)
//! 3. Price sequentially against a pool state owned by this call only
//! 4. Commit quantized prices; ignorable failures end the batch quietly
//! 5. Persist the cursor, then emit audit rows
//!
//! The cursor only moves after a successful commit, or when a batch
//! consumed nothing but cancelled/executed requests. Pool state is never
//! persisted: every batch starts from freshly loaded Greeks, so an aborted
//! batch leaves nothing behind.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::audit::{AuditRows, AuditSink};
use crate::commit::{CommitPayload, CommitReceipt, SettlementCommitter};
use crate::error::{BatchError, CommitError};
use crate::loaders::{GreeksFallbackChain, MarketContextLoader, RequestQueue};
use crate::notify::OperatorNotifier;
use crate::store::StateStore;
use olp_models::{AssetRegistry, PoolRiskState};
use olp_options::{PriceQuantizer, PricingModel, SequentialPricer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a batch reads from.
#[derive(Clone)]
pub struct BatchSources {
    pub market: Arc<dyn MarketContextLoader>,
    pub greeks: GreeksFallbackChain,
    pub queue: Arc<dyn RequestQueue>,
}

/// Where a batch writes to.
#[derive(Clone)]
pub struct BatchSinks {
    pub committer: Arc<dyn SettlementCommitter>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn OperatorNotifier>,
    pub cursor: Arc<dyn StateStore<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    pub batch_id: Uuid,
    pub receipt: CommitReceipt,
    pub priced: usize,
    pub skipped: usize,
    pub cursor: u64,
    pub audit_emitted: bool,
    /// Name of the Greeks source that served the batch.
    pub greeks_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BatchOutcome {
    /// Queue empty at the cursor.
    Idle,
    /// First request still pending; nothing consumed.
    Halted { at: Option<u64> },
    /// Only cancelled or executed requests were consumed.
    SkippedOnly { skipped: usize, cursor: u64 },
    /// The ledger refused the batch with an ignorable error.
    Ignored { reason: String },
    Committed(CommitSummary),
}

impl BatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Halted { .. } => "halted",
            Self::SkippedOnly { .. } => "skipped_only",
            Self::Ignored { .. } => "ignored",
            Self::Committed(_) => "committed",
        }
    }
}

pub struct BatchExecutor {
    model: Arc<dyn PricingModel>,
    registry: AssetRegistry,
    quantizer: PriceQuantizer,
    sources: BatchSources,
    sinks: BatchSinks,
    run_id: Uuid,
}

impl BatchExecutor {
    pub fn new(model: Arc<dyn PricingModel>, sources: BatchSources, sinks: BatchSinks) -> Self {
        Self {
            model,
            registry: AssetRegistry::new(),
            quantizer: PriceQuantizer::default(),
            sources,
            sinks,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_registry(mut self, registry: AssetRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_quantizer(mut self, quantizer: PriceQuantizer) -> Self {
        self.quantizer = quantizer;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs one batch of at most `max_items` requests.
    ///
    /// # Returns
    /// What the batch did, or the error that aborted it. Errors are also
    /// sent to the operator notifier.
    pub async fn run_batch(&self, max_items: usize) -> Result<BatchOutcome, BatchError> {
        let started = Instant::now();
        let result = self.execute(max_items).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::counter!("olp_batches_total", "outcome" => label).increment(1);
        metrics::histogram!("olp_batch_duration_seconds").record(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            error!("[BATCH] Batch aborted: {}", err);
            self.escalate("batch aborted", &err.to_string()).await;
        }
        result
    }

    async fn execute(&self, max_items: usize) -> Result<BatchOutcome, BatchError> {
        let cursor = self
            .sinks
            .cursor
            .load()
            .await
            .map_err(|e| BatchError::store(&e))?
            .unwrap_or(0);

        let pending = self
            .sources
            .queue
            .load_pending(cursor, max_items)
            .await
            .map_err(|e| BatchError::load("position requests", &e))?;
        if pending.requests.is_empty() {
            debug!("[BATCH] No requests at cursor {} (ledger end {})", cursor, pending.end_index);
            return Ok(BatchOutcome::Idle);
        }

        let market = self
            .sources
            .market
            .load_market_context()
            .await
            .map_err(|e| BatchError::load("market context", &e))?;
        let (greeks, served_by) = self.sources.greeks.load().await?;
        let state = PoolRiskState::new(greeks, pending.utility_ratios);

        info!(
            "[BATCH] Pricing {} requests from {} with {} (greeks: {})",
            pending.requests.len(),
            cursor,
            self.model.name(),
            served_by
        );
        let batch = {
            let mut pricer =
                SequentialPricer::new(self.model.as_ref(), &market, &self.registry, self.quantizer, state);
            pricer.price_batch(&pending.requests, cursor)?
        };

        if batch.priced.is_empty() {
            if batch.cursor_after == cursor {
                info!("[BATCH] Request {} pending, nothing to do", cursor);
                return Ok(BatchOutcome::Halted { at: batch.halted_at });
            }
            self.save_cursor(batch.cursor_after).await?;
            info!("[BATCH] Skipped {} requests, cursor -> {}", batch.skipped.len(), batch.cursor_after);
            return Ok(BatchOutcome::SkippedOnly { skipped: batch.skipped.len(), cursor: batch.cursor_after });
        }

        let payload = CommitPayload::from_batch(&batch, market.as_of, pending.end_index)?;
        let receipt = match self.sinks.committer.commit(&payload).await {
            Ok(receipt) => receipt,
            Err(err) => {
                let classified = CommitError::classify(&err);
                if classified.is_ignorable() {
                    info!("[COMMIT] Ignoring {} for batch {}", classified, payload.batch_id);
                    return Ok(BatchOutcome::Ignored { reason: classified.to_string() });
                }
                return Err(BatchError::Commit(classified));
            }
        };
        info!(
            "[COMMIT] Batch {} settled {} requests via {} ({})",
            payload.batch_id,
            payload.len(),
            self.sinks.committer.name(),
            receipt.reference
        );

        self.save_cursor(batch.cursor_after).await?;

        let rows = AuditRows::build(self.run_id, &payload, &receipt, &batch);
        let audit_emitted = match self.sinks.audit.emit(&receipt, &rows).await {
            Ok(()) => true,
            Err(err) => {
                warn!("[BATCH] Audit emission failed for {}: {:#}", payload.batch_id, err);
                self.escalate("audit emission failed", &format!("{err:#}")).await;
                false
            }
        };

        Ok(BatchOutcome::Committed(CommitSummary {
            batch_id: payload.batch_id,
            receipt,
            priced: batch.priced.len(),
            skipped: batch.skipped.len(),
            cursor: batch.cursor_after,
            audit_emitted,
            greeks_source: served_by,
        }))
    }

    async fn save_cursor(&self, cursor: u64) -> Result<(), BatchError> {
        self.sinks.cursor.save(&cursor).await.map_err(|e| BatchError::store(&e))
    }

    async fn escalate(&self, subject: &str, detail: &str) {
        if let Err(err) = self.sinks.notifier.notify(subject, detail).await {
            warn!("[BATCH] Operator notification failed: {:#}", err);
        }
    }
}
