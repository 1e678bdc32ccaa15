//! Shared fixtures for the pricer and solver tests.

#![allow(dead_code)]

use olp_models::{
    InstrumentId, InstrumentMark, MarketContext, PoolRiskState, PositionRequest, RequestStatus, Tranche,
    UnderlyingAsset, UtilityRatio,
};
use olp_options::token_id::{encode, OptionLeg};

pub const AS_OF: i64 = 1_764_576_000; // 2025-12-01 08:00 UTC
pub const EXPIRY: i64 = 1_766_736_000; // 2025-12-26 08:00 UTC

pub fn market() -> MarketContext {
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

pub fn funded_pool(deposited_usd: f64) -> PoolRiskState {
    let ratios = Tranche::ALL.iter().map(|t| (*t, UtilityRatio::new(0.0, deposited_usd))).collect();
    PoolRiskState::new(Default::default(), ratios)
}

pub fn vanilla(strike: u64, is_call: bool, is_buy: bool) -> InstrumentId {
    encode(UnderlyingAsset::Btc, EXPIRY, &[OptionLeg { is_buy, strike, is_call }], Tranche::Short)
        .expect("valid vanilla")
}

pub fn open_request(index: u64, instrument_id: InstrumentId, usdc: u128) -> PositionRequest {
    PositionRequest {
        index,
        is_open: true,
        account: format!("0xacc{index}"),
        instrument_id,
        amount_or_size: usdc * 1_000_000,
        block_time: AS_OF - 60,
        status: RequestStatus::Ready,
        size_out_or_amount_out: 0,
        execution_price: 0,
        process_block_time: 0,
        paths: ["USDC".into(), String::new()],
    }
}

/// Close of `raw` contracts at the underlying's 8 decimals.
pub fn close_request(index: u64, instrument_id: InstrumentId, raw: u128) -> PositionRequest {
    PositionRequest {
        is_open: false,
        amount_or_size: raw,
        paths: [String::new(), "USDC".into()],
        ..open_request(index, instrument_id, 0)
    }
}

pub fn with_status(mut request: PositionRequest, status: RequestStatus) -> PositionRequest {
    request.status = status;
    request
}
