//! Shared fixtures for the settlement tests.

#![allow(dead_code)]

use olp_models::{
    Greeks, InstrumentId, InstrumentMark, MarketContext, PositionRequest, RequestStatus, Tranche, UnderlyingAsset,
    UtilityRatio, UtilityRatios,
};
use olp_options::token_id::{encode, OptionLeg};
use olp_options::{
    FeeSchedule, MarkQuote, OpenSizeInput, PricingError, PricingModel, ReferenceModel, RiskPremiumInput,
    RiskPremiumOutcome,
};
use olp_settlement::memory::{InMemoryLedger, MemoryAuditSink, RecordingNotifier, StaticGreeks, StaticMarket};
use olp_settlement::{
    BatchExecutor, BatchSinks, BatchSources, GreeksFallbackChain, MemoryStore, TrancheGreeks,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const AS_OF: i64 = 1_764_576_000; // 2025-12-01 08:00 UTC
pub const EXPIRY: i64 = 1_766_736_000; // 2025-12-26 08:00 UTC

pub fn market() -> MarketContext {
    let mut ctx = MarketContext { as_of: AS_OF, ..Default::default() };
    ctx.spot_indices.insert("BTC".into(), 60_000.0);
    ctx.spot_indices.insert("USDC".into(), 1.0);
    ctx.futures_indices.insert(UnderlyingAsset::Btc, 60_000.0);
    ctx.instruments.insert("BTC-26DEC25-60000-C".into(), InstrumentMark { mark_price: 2_500.0, mark_iv: 0.5 });
    ctx.instruments.insert("BTC-26DEC25-50000-P".into(), InstrumentMark { mark_price: 400.0, mark_iv: 0.55 });
    ctx
}

pub fn ratios() -> UtilityRatios {
    Tranche::ALL.iter().map(|t| (*t, UtilityRatio::new(0.0, 1_000_000.0))).collect()
}

pub fn pool_greeks(delta: f64) -> TrancheGreeks {
    let mut greeks = TrancheGreeks::new();
    greeks
        .entry(Tranche::Short)
        .or_default()
        .insert(UnderlyingAsset::Btc, Greeks::new(delta, 0.0, 0.0, 0.0));
    greeks
}

pub fn call_id() -> InstrumentId {
    encode(UnderlyingAsset::Btc, EXPIRY, &[OptionLeg { is_buy: true, strike: 60_000, is_call: true }], Tranche::Short)
        .expect("valid call")
}

pub fn request(index: u64, status: RequestStatus) -> PositionRequest {
    PositionRequest {
        index,
        is_open: true,
        account: format!("0xTrader{}", index % 2),
        instrument_id: call_id(),
        amount_or_size: 1_000_000_000,
        block_time: AS_OF - 60,
        status,
        size_out_or_amount_out: 0,
        execution_price: 0,
        process_block_time: 0,
        paths: ["USDC".into(), String::new()],
    }
}

pub fn put_id() -> InstrumentId {
    encode(UnderlyingAsset::Btc, EXPIRY, &[OptionLeg { is_buy: true, strike: 50_000, is_call: false }], Tranche::Short)
        .expect("valid put")
}

/// Close of `raw` contracts at the underlying's 8 decimals.
pub fn close_request(index: u64, status: RequestStatus, raw: u128) -> PositionRequest {
    PositionRequest {
        is_open: false,
        amount_or_size: raw,
        paths: [String::new(), "USDC".into()],
        ..request(index, status)
    }
}

/// Reference model whose risk premium fails on the `fail_at`-th call.
pub struct FailingModel {
    inner: ReferenceModel,
    fail_at: usize,
    pub calls: AtomicUsize,
}

impl FailingModel {
    pub fn new(fail_at: usize) -> Self {
        Self { inner: ReferenceModel::default(), fail_at, calls: AtomicUsize::new(0) }
    }
}

impl PricingModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn fee_schedule(&self) -> &FeeSchedule {
        self.inner.fee_schedule()
    }

    fn underlying_futures(&self, market: &MarketContext, asset: UnderlyingAsset, expiry: i64) -> Result<f64, PricingError> {
        self.inner.underlying_futures(market, asset, expiry)
    }

    fn mark_quote(
        &self,
        market: &MarketContext,
        facts: &olp_options::InstrumentFacts,
        underlying_futures: f64,
    ) -> Result<MarkQuote, PricingError> {
        self.inner.mark_quote(market, facts, underlying_futures)
    }

    fn estimate_open_size(&self, input: &OpenSizeInput<'_>) -> Result<f64, PricingError> {
        self.inner.estimate_open_size(input)
    }

    fn open_amount_after_fee(&self, input: &OpenSizeInput<'_>, estimated_size: f64) -> Result<f64, PricingError> {
        self.inner.open_amount_after_fee(input, estimated_size)
    }

    fn risk_premium(&self, input: &RiskPremiumInput<'_>) -> Result<RiskPremiumOutcome, PricingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_at {
            return Err(PricingError::Model("risk engine unavailable".into()));
        }
        self.inner.risk_premium(input)
    }
}

pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub audit: Arc<MemoryAuditSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub cursor: Arc<MemoryStore<u64>>,
    pub executor: BatchExecutor,
}

pub fn harness(model: Arc<dyn PricingModel>, requests: Vec<PositionRequest>, primary: Option<TrancheGreeks>) -> Harness {
    harness_with_audit(model, requests, primary, MemoryAuditSink::default())
}

pub fn harness_with_audit(
    model: Arc<dyn PricingModel>,
    requests: Vec<PositionRequest>,
    primary: Option<TrancheGreeks>,
    audit: MemoryAuditSink,
) -> Harness {
    build_harness(model, requests, primary, Some(pool_greeks(0.0)), audit)
}

/// Harness with both Greeks tiers scripted.
pub fn harness_with_tiers(
    model: Arc<dyn PricingModel>,
    requests: Vec<PositionRequest>,
    primary: Option<TrancheGreeks>,
    secondary: Option<TrancheGreeks>,
) -> Harness {
    build_harness(model, requests, primary, secondary, MemoryAuditSink::default())
}

fn build_harness(
    model: Arc<dyn PricingModel>,
    requests: Vec<PositionRequest>,
    primary: Option<TrancheGreeks>,
    secondary: Option<TrancheGreeks>,
    audit: MemoryAuditSink,
) -> Harness {
    let ledger = Arc::new(InMemoryLedger::new(requests, ratios()));
    let audit = Arc::new(audit);
    let notifier = Arc::new(RecordingNotifier::default());
    let cursor = Arc::new(MemoryStore::<u64>::new(None));

    let greeks = GreeksFallbackChain::default()
        .with_source(Arc::new(StaticGreeks::new("primary", primary)))
        .with_source(Arc::new(StaticGreeks::new("secondary", secondary)));
    let sources = BatchSources { market: Arc::new(StaticMarket(market())), greeks, queue: ledger.clone() };
    let sinks = BatchSinks {
        committer: ledger.clone(),
        audit: audit.clone(),
        notifier: notifier.clone(),
        cursor: cursor.clone(),
    };

    Harness { ledger, audit, notifier, cursor, executor: BatchExecutor::new(model, sources, sinks) }
}
