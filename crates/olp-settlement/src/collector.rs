//! # Trade-Data Collector
//!
//! Aggregates settled position requests into running trade statistics.
//!
//! ## Description
//! A second, independent batch runner. It keeps its own cursor inside the
//! persisted [`TradeStats`] and never touches pool state. Per request:
//! - `Pending` or `Ready`: not settled yet, stop
//! - `Cancelled`: skip, advance
//! - `Executed`: aggregate, advance
//!
//! Notional volume is `size * historical spot` counted once per leg. The
//! historical spot comes from the first price source that answers; a zero
//! price stops the run with a warning. Any per-request failure stops the
//! run too. Either way the progress made so far is saved.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::BatchError;
use crate::loaders::RequestQueue;
use crate::notify::OperatorNotifier;
use crate::store::StateStore;
use async_trait::async_trait;
use olp_models::amount::usd30;
use olp_models::asset::from_raw;
use olp_models::{PositionRequest, RequestStatus, Strategy, Tranche, UnderlyingAsset};
use olp_options::token_id;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Spot price of an underlying at a past instant.
#[async_trait]
pub trait HistoricalPriceSource: Send + Sync {
    fn name(&self) -> &str;

    async fn spot_at(&self, asset: UnderlyingAsset, timestamp: i64) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSizes {
    pub buy: f64,
    pub sell: f64,
}

impl SideSizes {
    fn add(&mut self, is_buy: bool, size: f64) {
        if is_buy {
            self.buy += size;
        } else {
            self.sell += size;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionSizes {
    pub call: SideSizes,
    pub put: SideSizes,
}

impl DirectionSizes {
    fn add(&mut self, strategy: Strategy, size: f64) {
        let side = if strategy.is_call() { &mut self.call } else { &mut self.put };
        side.add(strategy.is_buy(), size);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraderAssetStats {
    pub trade_count: u64,
    pub trade_size: f64,
    pub notional_volume: f64,
    pub open: DirectionSizes,
    pub close: DirectionSizes,
    pub open_by_strategy: BTreeMap<Strategy, f64>,
    pub size_by_tranche: BTreeMap<Tranche, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrancheAssetStats {
    pub trade_count: u64,
    pub trade_size: f64,
    pub notional_volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Next request index to read.
    pub cursor: u64,
    pub notional_volume: f64,
    /// Sum of `size * execution price`.
    pub execution_value: f64,
    pub trade_count: u64,
    pub size_by_asset: BTreeMap<UnderlyingAsset, f64>,
    pub traders: BTreeMap<String, BTreeMap<UnderlyingAsset, TraderAssetStats>>,
    pub tranches: BTreeMap<Tranche, BTreeMap<UnderlyingAsset, TrancheAssetStats>>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TradeStats {
    pub fn trader_count(&self) -> usize {
        self.traders.len()
    }

    pub fn distinct_traders(&self) -> BTreeSet<&str> {
        self.traders.keys().map(String::as_str).collect()
    }

    /// Folds one settled trade in.
    pub fn record(&mut self, trade: &SettledTrade) {
        let notional = trade.size * trade.spot * trade.leg_count as f64;
        self.notional_volume += notional;
        self.execution_value += trade.size * trade.execution_price;
        self.trade_count += 1;
        *self.size_by_asset.entry(trade.underlying).or_default() += trade.size;

        let trader = self
            .traders
            .entry(trade.account.clone())
            .or_default()
            .entry(trade.underlying)
            .or_default();
        trader.trade_count += 1;
        trader.trade_size += trade.size;
        trader.notional_volume += notional;
        if trade.is_open {
            trader.open.add(trade.strategy, trade.size);
            *trader.open_by_strategy.entry(trade.strategy).or_default() += trade.size;
        } else {
            trader.close.add(trade.strategy, trade.size);
        }
        *trader.size_by_tranche.entry(trade.tranche).or_default() += trade.size;

        let tranche = self
            .tranches
            .entry(trade.tranche)
            .or_default()
            .entry(trade.underlying)
            .or_default();
        tranche.trade_count += 1;
        tranche.trade_size += trade.size;
        tranche.notional_volume += notional;
    }
}

/// One executed request, in human units.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledTrade {
    pub account: String,
    pub underlying: UnderlyingAsset,
    pub strategy: Strategy,
    pub tranche: Tranche,
    pub leg_count: usize,
    pub is_open: bool,
    pub size: f64,
    pub execution_price: f64,
    pub spot: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CollectStop {
    /// Reached a request that is not settled yet.
    Unsettled { index: u64 },
    /// Every price source returned zero.
    ZeroPrice { index: u64 },
    Failed { index: u64, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectOutcome {
    pub recorded: usize,
    pub skipped: usize,
    pub cursor: u64,
    pub stopped: Option<CollectStop>,
}

pub struct TradeStatsCollector {
    queue: Arc<dyn RequestQueue>,
    prices: Vec<Arc<dyn HistoricalPriceSource>>,
    store: Arc<dyn StateStore<TradeStats>>,
    notifier: Arc<dyn OperatorNotifier>,
}

impl TradeStatsCollector {
    pub fn new(
        queue: Arc<dyn RequestQueue>,
        prices: Vec<Arc<dyn HistoricalPriceSource>>,
        store: Arc<dyn StateStore<TradeStats>>,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        Self { queue, prices, store, notifier }
    }

    /// Collects up to `max_items` requests past the stored cursor.
    pub async fn run_batch(&self, max_items: usize) -> Result<CollectOutcome, BatchError> {
        let mut stats = self.store.load().await.map_err(|e| BatchError::store(&e))?.unwrap_or_default();
        let pending = self
            .queue
            .load_pending(stats.cursor, max_items)
            .await
            .map_err(|e| BatchError::load("position requests", &e))?;

        let mut outcome = CollectOutcome { recorded: 0, skipped: 0, cursor: stats.cursor, stopped: None };
        if pending.requests.is_empty() {
            debug!("[COLLECTOR] No new requests at {}", stats.cursor);
            return Ok(outcome);
        }

        for request in &pending.requests {
            match request.status {
                RequestStatus::Pending | RequestStatus::Ready => {
                    debug!("[COLLECTOR] Request {} not settled yet", request.index);
                    outcome.stopped = Some(CollectStop::Unsettled { index: request.index });
                    break;
                }
                RequestStatus::Cancelled => {
                    outcome.skipped += 1;
                    stats.cursor = request.index + 1;
                    continue;
                }
                RequestStatus::Executed => {}
            }

            let trade = match self.settled_trade(request).await {
                Ok(Some(trade)) => trade,
                Ok(None) => {
                    warn!("[COLLECTOR] Historical price is zero for request {}", request.index);
                    self.escalate("historical price is zero", &format!("request {}", request.index)).await;
                    outcome.stopped = Some(CollectStop::ZeroPrice { index: request.index });
                    break;
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!("[COLLECTOR] Request {} failed: {}", request.index, message);
                    self.escalate("trade collection failed", &message).await;
                    outcome.stopped = Some(CollectStop::Failed { index: request.index, message });
                    break;
                }
            };
            stats.record(&trade);
            stats.cursor = request.index + 1;
            outcome.recorded += 1;
        }

        stats.updated_at = Some(chrono::Utc::now());
        self.store.save(&stats).await.map_err(|e| BatchError::store(&e))?;
        outcome.cursor = stats.cursor;
        info!(
            "[COLLECTOR] Recorded {} trades, skipped {}, cursor -> {}",
            outcome.recorded, outcome.skipped, outcome.cursor
        );
        Ok(outcome)
    }

    async fn settled_trade(&self, request: &PositionRequest) -> anyhow::Result<Option<SettledTrade>> {
        let facts = token_id::decode(&request.instrument_id)?;
        let raw_size = if request.is_open { request.size_out_or_amount_out } else { request.amount_or_size };
        let size = from_raw(raw_size, facts.underlying.decimals());
        let at = if request.process_block_time > 0 { request.process_block_time } else { request.block_time };

        let spot = self.historical_spot(facts.underlying, at).await?;
        if spot == 0.0 {
            return Ok(None);
        }

        Ok(Some(SettledTrade {
            account: request.account.to_lowercase(),
            underlying: facts.underlying,
            strategy: facts.strategy,
            tranche: facts.tranche,
            leg_count: facts.leg_count(),
            is_open: request.is_open,
            size,
            execution_price: usd30::to_usd(request.execution_price),
            spot,
        }))
    }

    /// First non-zero price in source order; zero when sources answered
    /// without one, an error when none answered at all.
    async fn historical_spot(&self, asset: UnderlyingAsset, at: i64) -> anyhow::Result<f64> {
        let mut last_err = None;
        let mut answered = false;
        for source in &self.prices {
            match source.spot_at(asset, at).await {
                Ok(price) if price.is_finite() && price > 0.0 => return Ok(price),
                Ok(_) => {
                    debug!("[COLLECTOR] {} has no {} price at {}", source.name(), asset, at);
                    answered = true;
                }
                Err(err) => {
                    warn!("[COLLECTOR] {} failed: {:#}", source.name(), err);
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if !answered => Err(err),
            _ => Ok(0.0),
        }
    }

    async fn escalate(&self, subject: &str, detail: &str) {
        if let Err(err) = self.notifier.notify(subject, detail).await {
            warn!("[COLLECTOR] Operator notification failed: {:#}", err);
        }
    }
}
