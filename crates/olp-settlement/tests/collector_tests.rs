//! Trade statistics collection over settled requests.

mod common;

use async_trait::async_trait;
use common::*;
use olp_models::{RequestStatus, UnderlyingAsset};
use olp_options::ReferenceModel;
use olp_settlement::memory::{InMemoryLedger, RecordingNotifier};
use olp_settlement::{
    BatchOutcome, CollectStop, HistoricalPriceSource, JsonFileStore, MemoryStore, StateStore, TradeStats,
    TradeStatsCollector,
};
use std::sync::Arc;

struct FixedPrice(f64);

#[async_trait]
impl HistoricalPriceSource for FixedPrice {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn spot_at(&self, _asset: UnderlyingAsset, _timestamp: i64) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}

struct Offline;

#[async_trait]
impl HistoricalPriceSource for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn spot_at(&self, _asset: UnderlyingAsset, _timestamp: i64) -> anyhow::Result<f64> {
        anyhow::bail!("connection refused")
    }
}

fn fixed(price: f64) -> Arc<dyn HistoricalPriceSource> {
    Arc::new(FixedPrice(price))
}

fn offline() -> Arc<dyn HistoricalPriceSource> {
    Arc::new(Offline)
}

fn executed(index: u64, size_btc: f64) -> olp_models::PositionRequest {
    let mut r = request(index, RequestStatus::Executed);
    r.size_out_or_amount_out = (size_btc * 1e8) as u128;
    r.execution_price = 2_600 * 10u128.pow(30);
    r.process_block_time = AS_OF;
    r
}

fn collector(
    ledger: Arc<InMemoryLedger>,
    prices: Vec<Arc<dyn HistoricalPriceSource>>,
    store: Arc<dyn StateStore<TradeStats>>,
) -> TradeStatsCollector {
    TradeStatsCollector::new(ledger, prices, store, Arc::new(RecordingNotifier::default()))
}

#[tokio::test]
async fn test_aggregates_and_stops_at_unsettled() {
    let ledger = Arc::new(InMemoryLedger::new(
        vec![
            executed(0, 0.5),
            request(1, RequestStatus::Cancelled),
            executed(2, 1.5),
            request(3, RequestStatus::Ready),
        ],
        ratios(),
    ));
    let store = Arc::new(MemoryStore::<TradeStats>::new(None));
    let c = collector(ledger, vec![offline(), fixed(60_000.0)], store.clone());

    let outcome = c.run_batch(8).await.unwrap();
    assert_eq!(outcome.recorded, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.cursor, 3);
    assert_eq!(outcome.stopped, Some(CollectStop::Unsettled { index: 3 }));

    let stats = store.get().unwrap();
    assert_eq!(stats.trade_count, 2);
    assert_eq!(stats.trader_count(), 1);
    assert!((stats.notional_volume - 2.0 * 60_000.0).abs() < 1e-6);
    assert!((stats.execution_value - 2.0 * 2_600.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_zero_price_saves_progress() {
    let ledger = Arc::new(InMemoryLedger::new(vec![executed(0, 1.0)], ratios()));
    let store = Arc::new(MemoryStore::<TradeStats>::new(None));
    let c = collector(ledger, vec![fixed(0.0)], store.clone());

    let outcome = c.run_batch(8).await.unwrap();
    assert_eq!(outcome.stopped, Some(CollectStop::ZeroPrice { index: 0 }));
    assert_eq!(store.get().map(|s| s.cursor), Some(0));
}

#[tokio::test]
async fn test_all_sources_down_is_a_request_failure() {
    let ledger = Arc::new(InMemoryLedger::new(vec![executed(0, 1.0)], ratios()));
    let store = Arc::new(MemoryStore::<TradeStats>::new(None));
    let c = collector(ledger, vec![offline()], store.clone());

    let outcome = c.run_batch(8).await.unwrap();
    assert!(matches!(outcome.stopped, Some(CollectStop::Failed { index: 0, .. })));
    assert_eq!(outcome.recorded, 0);
}

#[tokio::test]
async fn test_collects_what_the_executor_settled() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        Arc::new(ReferenceModel::default()),
        vec![request(0, RequestStatus::Ready), request(1, RequestStatus::Ready)],
        Some(pool_greeks(0.0)),
    );
    assert!(matches!(h.executor.run_batch(8).await.unwrap(), BatchOutcome::Committed(_)));

    let store: Arc<JsonFileStore<TradeStats>> = Arc::new(JsonFileStore::new(dir.path().join("trade-stats.json")));
    let c = collector(h.ledger.clone(), vec![fixed(60_000.0)], store.clone());
    let outcome = c.run_batch(8).await.unwrap();
    assert_eq!(outcome.recorded, 2);
    assert_eq!(outcome.stopped, None);

    let stats = store.load().await.unwrap().unwrap();
    assert_eq!(stats.cursor, 2);
    assert_eq!(stats.trade_count, 2);
    assert_eq!(stats.trader_count(), 2);
}
