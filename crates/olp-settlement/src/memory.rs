//! # In-Memory Collaborators
//!
//! Process-local implementations of every batch seam.
//!
//! ## Description
//! [`InMemoryLedger`] keeps a request queue and per-tranche utility ratios,
//! accepts commits by marking the covered requests executed once every
//! lane's index and instrument match the queue, and can be scripted to fail
//! the next commits with a given message. The remaining
//! types serve fixed snapshots or record what they receive. They back the
//! integration tests and the keeper's dry-run mode.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::audit::{AuditRows, AuditSink};
use crate::commit::{unpack_prices, CommitPayload, CommitReceipt, SettlementCommitter};
use crate::loaders::{GreeksSource, MarketContextLoader, PendingBatch, RequestQueue, TrancheGreeks};
use crate::notify::OperatorNotifier;
use async_trait::async_trait;
use olp_models::amount::usd30;
use olp_models::{MarketContext, PositionRequest, RequestStatus, UtilityRatios};
use olp_options::quantize::PRICE_SCALE;
use olp_options::token_id;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow::anyhow!("in-memory state poisoned"))
}

#[derive(Debug, Default)]
struct LedgerState {
    requests: Vec<PositionRequest>,
    utility_ratios: UtilityRatios,
    commits: Vec<CommitPayload>,
    scripted_failures: VecDeque<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(requests: Vec<PositionRequest>, utility_ratios: UtilityRatios) -> Self {
        let state = LedgerState { requests, utility_ratios, ..Default::default() };
        Self { state: Mutex::new(state) }
    }

    /// Makes the next commit fail with `message`.
    pub fn fail_next_commit(&self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.scripted_failures.push_back(message.to_string());
        }
    }

    pub fn push_request(&self, request: PositionRequest) {
        if let Ok(mut state) = self.state.lock() {
            state.requests.push(request);
        }
    }

    pub fn commits(&self) -> Vec<CommitPayload> {
        self.state.lock().map(|s| s.commits.clone()).unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<PositionRequest> {
        self.state.lock().map(|s| s.requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RequestQueue for InMemoryLedger {
    async fn load_pending(&self, cursor: u64, max_items: usize) -> anyhow::Result<PendingBatch> {
        let state = lock(&self.state)?;
        let requests = state
            .requests
            .iter()
            .filter(|r| r.index >= cursor)
            .take(max_items)
            .cloned()
            .collect();
        let end_index = state.requests.last().map(|r| r.index + 1).unwrap_or(0);
        Ok(PendingBatch { requests, utility_ratios: state.utility_ratios.clone(), end_index })
    }
}

#[async_trait]
impl SettlementCommitter for InMemoryLedger {
    async fn commit(&self, payload: &CommitPayload) -> anyhow::Result<CommitReceipt> {
        let mut state = lock(&self.state)?;
        if let Some(message) = state.scripted_failures.pop_front() {
            anyhow::bail!(message);
        }

        let marks = unpack_prices(&payload.mark_prices, payload.len());
        let premiums = unpack_prices(&payload.risk_premiums, payload.len());
        let mut fills = Vec::with_capacity(payload.len());
        for (lane, index) in payload.request_indices.iter().enumerate() {
            let position = state
                .requests
                .iter()
                .position(|r| r.index == *index)
                .ok_or_else(|| anyhow::anyhow!("unknown request index {index}"))?;
            let request = &state.requests[position];
            if request.status != RequestStatus::Ready {
                anyhow::bail!("request {index} is not ready");
            }
            match payload.instrument_ids.get(lane) {
                Some(id) if *id == request.instrument_id => {}
                Some(id) => {
                    anyhow::bail!("request {index} instrument mismatch: queued {}, got {id}", request.instrument_id)
                }
                None => anyhow::bail!("payload is missing the instrument for lane {lane}"),
            }
            let is_buy = token_id::decode(&request.instrument_id)?.strategy.is_buy();
            let (mark, premium) = match (marks.get(lane), premiums.get(lane)) {
                (Some(mark), Some(premium)) => (*mark as f64, *premium as f64),
                _ => anyhow::bail!("payload is missing lane {lane}"),
            };
            let ticks = if is_buy { mark + premium } else { (mark - premium).max(0.0) };
            fills.push((position, ticks / PRICE_SCALE));
        }

        for (position, price) in fills {
            let request = &mut state.requests[position];
            request.status = RequestStatus::Executed;
            request.execution_price = (price * usd30::SCALE) as u128;
            request.process_block_time = payload.as_of;
        }

        state.commits.push(payload.clone());
        Ok(CommitReceipt {
            reference: format!("mem-{}", state.commits.len()),
            committed_at: payload.as_of,
        })
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Serves the same market snapshot every time.
#[derive(Debug, Clone)]
pub struct StaticMarket(pub MarketContext);

#[async_trait]
impl MarketContextLoader for StaticMarket {
    async fn load_market_context(&self) -> anyhow::Result<MarketContext> {
        Ok(self.0.clone())
    }
}

/// Serves fixed Greeks, or fails when built with `None`.
#[derive(Debug, Clone)]
pub struct StaticGreeks {
    pub name: String,
    pub greeks: Option<TrancheGreeks>,
}

impl StaticGreeks {
    pub fn new(name: &str, greeks: Option<TrancheGreeks>) -> Self {
        Self { name: name.to_string(), greeks }
    }
}

#[async_trait]
impl GreeksSource for StaticGreeks {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_greeks(&self) -> anyhow::Result<TrancheGreeks> {
        self.greeks
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} unavailable", self.name))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, subject: &str, detail: &str) -> anyhow::Result<()> {
        lock(&self.messages)?.push(format!("{subject}: {detail}"));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    batches: Mutex<Vec<AuditRows>>,
    fail: bool,
}

impl MemoryAuditSink {
    /// Sink whose every emit fails.
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn batches(&self) -> Vec<AuditRows> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, _receipt: &CommitReceipt, rows: &AuditRows) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("audit sink unavailable");
        }
        lock(&self.batches)?.push(rows.clone());
        Ok(())
    }
}
