//! End-to-end keeper runs over a snapshot file in a temporary directory.

use olp_keeper::snapshot::{GreeksTiers, LedgerSnapshot, SnapshotFile};
use olp_keeper::supervisor::{Schedule, Supervisor};
use olp_keeper::{solve, CollateralArgs, KeeperConfig, SolveArgs, SpreadArgs};
use olp_models::{
    Greeks, InstrumentMark, MarketContext, PositionRequest, RequestStatus, Tranche, UnderlyingAsset, UtilityRatio,
};
use olp_options::token_id::{decode, encode, spread_legs, OptionLeg};
use olp_settlement::{
    BatchExecutor, BatchSinks, BatchSources, GreeksFallbackChain, GreeksSource, JsonFileStore, LogNotifier,
    MemoryStore, StateStore, StaticGreeks, TracingAuditSink,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const AS_OF: i64 = 1_764_576_000;
const EXPIRY: i64 = 1_766_736_000;

fn market() -> MarketContext {
    let mut ctx = MarketContext { as_of: AS_OF, ..Default::default() };
    ctx.spot_indices.insert("BTC".into(), 60_000.0);
    ctx.spot_indices.insert("USDC".into(), 1.0);
    ctx.futures_indices.insert(UnderlyingAsset::Btc, 60_000.0);
    for (name, mark_price, mark_iv) in [
        ("BTC-26DEC25-50000-P", 400.0, 0.55),
        ("BTC-26DEC25-60000-C", 2_500.0, 0.5),
        ("BTC-26DEC25-70000-C", 600.0, 0.6),
    ] {
        ctx.instruments.insert(name.into(), InstrumentMark { mark_price, mark_iv });
    }
    ctx
}

fn request(index: u64, status: RequestStatus) -> PositionRequest {
    let id = encode(
        UnderlyingAsset::Btc,
        EXPIRY,
        &[OptionLeg { is_buy: true, strike: 60_000, is_call: true }],
        Tranche::Short,
    )
    .unwrap();
    PositionRequest {
        index,
        is_open: true,
        account: format!("0xTrader{}", index % 2),
        instrument_id: id,
        amount_or_size: 1_000 * 1_000_000,
        block_time: AS_OF - 60,
        status,
        size_out_or_amount_out: 0,
        execution_price: 0,
        process_block_time: 0,
        paths: ["USDC".into(), String::new()],
    }
}

fn snapshot(requests: Vec<PositionRequest>) -> LedgerSnapshot {
    let short = BTreeMap::from([(UnderlyingAsset::Btc, Greeks::new(-0.4, 0.00002, 35.0, -20.0))]);
    LedgerSnapshot {
        market: market(),
        greeks: GreeksTiers { primary: None, secondary: Some(BTreeMap::from([(Tranche::Short, short)])) },
        requests,
        utility_ratios: Tranche::ALL.iter().map(|t| (*t, UtilityRatio::new(0.0, 1_000_000.0))).collect(),
        historical_spots: BTreeMap::from([(UnderlyingAsset::Btc, 61_000.0)]),
    }
}

struct Workspace {
    dir: TempDir,
    config: KeeperConfig,
}

impl Workspace {
    fn new(snap: &LedgerSnapshot) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot.json"), serde_json::to_string(snap).unwrap()).unwrap();
        let root = dir.path().display().to_string();
        let config = KeeperConfig::from_toml_str(&format!(
            r#"
            [batch]
            max_items = 8
            interval_ms = 10

            [sources]
            snapshot = '{root}/snapshot.json'
            audit_log = '{root}/out/audit.jsonl'
            commit_journal = '{root}/out/commits.jsonl'
            cursor = '{root}/out/cursor.json'
            trade_stats = '{root}/out/stats.json'
            "#
        ))
        .unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn lines(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.path(name))
            .map(|raw| raw.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn repo_file(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(relative)
}

#[tokio::test]
async fn test_once_run_commits_and_journals() {
    let ws = Workspace::new(&snapshot(vec![
        request(0, RequestStatus::Ready),
        request(1, RequestStatus::Cancelled),
        request(2, RequestStatus::Ready),
    ]));

    let report = Supervisor::from_config(&ws.config, true).run().await;
    assert_eq!(report.batches, 1);
    assert_eq!(report.committed, 1);
    assert_eq!(report.batch_errors, 0);
    assert_eq!(report.collector_runs, 1);
    assert_eq!(report.trades_recorded, 0);

    let journal = ws.lines("out/commits.jsonl");
    assert_eq!(journal.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&journal[0]).unwrap();
    assert_eq!(payload["request_indices"], serde_json::json!([0, 2]));
    assert_eq!(payload["cursor_after"], 3);
    assert_eq!(payload["ledger_end_index"], 3);
    assert_eq!(payload["instrument_ids"].as_array().map(Vec::len), Some(2));

    assert_eq!(ws.lines("out/audit.jsonl").len(), 2);
    let cursor = JsonFileStore::<u64>::new(ws.path("out/cursor.json")).load().await.unwrap();
    assert_eq!(cursor, Some(3));

    let again = Supervisor::from_config(&ws.config, true).run().await;
    assert_eq!(again.committed, 0);
    assert_eq!(ws.lines("out/commits.jsonl").len(), 1);
}

#[tokio::test]
async fn test_collector_aggregates_settled_snapshot() {
    let mut executed = request(0, RequestStatus::Executed);
    executed.size_out_or_amount_out = 50_000_000; // 0.5 BTC
    executed.execution_price = 500_000_000_000_000_000_000_000_000_000_000;
    executed.process_block_time = AS_OF;
    let ws = Workspace::new(&snapshot(vec![executed, request(1, RequestStatus::Pending)]));

    let report = Supervisor::from_config(&ws.config, true).run().await;
    assert_eq!(report.trades_recorded, 1);
    assert_eq!(report.committed, 0);

    let stats: olp_settlement::TradeStats =
        serde_json::from_str(&std::fs::read_to_string(ws.path("out/stats.json")).unwrap()).unwrap();
    assert_eq!(stats.trade_count, 1);
    assert_eq!(stats.cursor, 1);
    assert!((stats.notional_volume - 0.5 * 61_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_missing_snapshot_counts_errors_without_panicking() {
    let mut config = KeeperConfig::default();
    let dir = tempfile::tempdir().unwrap();
    config.sources.snapshot = dir.path().join("absent.json");
    config.sources.cursor = dir.path().join("cursor.json");
    config.sources.trade_stats = dir.path().join("stats.json");

    let report = Supervisor::from_config(&config, true).run().await;
    assert_eq!(report.batches, 1);
    assert_eq!(report.batch_errors, 1);
    assert_eq!(report.collector_errors, 1);
    assert!(!dir.path().join("cursor.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_stops_starting_batches_at_deadline() {
    let greeks = GreeksFallbackChain::new(vec![
        Arc::new(StaticGreeks::new("static", Some(Default::default()))) as Arc<dyn GreeksSource>,
    ]);
    let ledger = Arc::new(olp_settlement::InMemoryLedger::new(Vec::new(), Default::default()));
    let executor = BatchExecutor::new(
        Arc::new(olp_options::ReferenceModel::default()),
        BatchSources {
            market: Arc::new(olp_settlement::StaticMarket(market())),
            greeks,
            queue: ledger.clone(),
        },
        BatchSinks {
            committer: ledger.clone(),
            audit: Arc::new(TracingAuditSink),
            notifier: Arc::new(LogNotifier),
            cursor: Arc::new(MemoryStore::<u64>::new(None)),
        },
    );
    let schedule = Schedule {
        max_items: 8,
        collector_max_items: 8,
        interval: Duration::from_millis(400),
        max_runtime: Duration::from_secs(1),
        once: false,
    };

    let report = Supervisor::new(executor, None, schedule).run().await;
    // Batches start at 0, 400 and 800 ms; the pause after the third ends at the deadline.
    assert_eq!(report.batches, 3);
    assert_eq!(report.committed, 0);
    assert_eq!(report.collector_runs, 0);
    assert!(ledger.commits().is_empty());
}

fn call_spread() -> SpreadArgs {
    SpreadArgs { asset: UnderlyingAsset::Btc, expiry: EXPIRY, strikes: vec![60_000, 70_000], call: true, buy: false }
}

#[tokio::test]
async fn test_solve_quotes_call_spread() {
    let snap = snapshot(Vec::new());
    let args = SolveArgs { spread: call_spread(), collateral: 250.0 };
    let report = solve::run(&KeeperConfig::default(), &snap, &args).unwrap();
    assert!(report.size > 0.0 && report.size < 1.0);
    assert!(report.iterations > 0);
    assert!(report.best_diff.is_finite());

    let bad = SolveArgs { spread: SpreadArgs { strikes: vec![60_000], ..call_spread() }, ..args };
    assert!(solve::run(&KeeperConfig::default(), &snap, &bad).is_err());
}

#[tokio::test]
async fn test_collateral_quote_inverts_solve() {
    let snap = snapshot(Vec::new());
    let config = KeeperConfig::default();
    let solved = solve::run(&config, &snap, &SolveArgs { spread: call_spread(), collateral: 250.0 }).unwrap();

    let args = CollateralArgs { spread: call_spread(), size: solved.size };
    let quote = solve::collateral(&config, &snap, &args).unwrap();
    assert!((quote.collateral - 250.0).abs() <= solved.best_diff + 1e-9);
    assert_eq!(quote.query.target_collateral, quote.collateral);

    let zero = CollateralArgs { spread: call_spread(), size: 0.0 };
    assert!(solve::collateral(&config, &snap, &zero).is_err());
    let one_strike = CollateralArgs { spread: SpreadArgs { strikes: vec![60_000], ..call_spread() }, size: 1.0 };
    assert!(solve::collateral(&config, &snap, &one_strike).is_err());
}

#[tokio::test]
async fn test_shipped_config_and_snapshot_load() {
    let config = KeeperConfig::load(repo_file("configs/keeper.toml")).unwrap();
    assert_eq!(config.batch.max_items, 8);
    let usdc = config.registry().resolve("0xAF88D065E77C8CC2239327C5EDB3A432268E5831").unwrap();
    assert_eq!(usdc, olp_models::QuoteAsset::Usdc);

    let snap = SnapshotFile::new(repo_file("configs/snapshot.json")).load().await.unwrap();
    assert_eq!(snap.requests.len(), 3);
    let strategies: Vec<_> = snap.requests.iter().map(|r| decode(&r.instrument_id).unwrap().strategy).collect();
    assert_eq!(
        strategies,
        vec![olp_models::Strategy::BuyCall, olp_models::Strategy::BuyPut, olp_models::Strategy::BuyCallSpread]
    );
    assert_eq!(decode(&snap.requests[2].instrument_id).unwrap().tranche, Tranche::Mid);
    assert_eq!(
        decode(&snap.requests[2].instrument_id).unwrap().legs.to_vec(),
        spread_legs([60_000, 70_000], true, true).to_vec()
    );
    assert!(snap.greeks.primary.is_some());
}
