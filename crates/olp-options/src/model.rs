//! # Pricing Model Seam
//!
//! The quantitative model consumed by the pricer and the solver.
//!
//! ## Description
//! The keeper does not own the option model; it calls it through
//! [`PricingModel`]. A model prices the underlying futures, marks
//! instruments, sizes open requests and computes the risk premium rate for
//! a trade against the current pool state. Implementations must be pure
//! with respect to their inputs: pool state mutation is the pricer's job.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::PricingError;
use crate::fees::FeeSchedule;
use crate::token_id::InstrumentFacts;
use olp_models::{Greeks, MarketContext, QuoteAsset, Tranche, UnderlyingAsset, UtilityRatios};
use serde::Serialize;

/// Mark data of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegQuote {
    pub strike: f64,
    pub mark_iv: f64,
    pub mark_price: f64,
}

/// Mark of a whole instrument plus its legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkQuote {
    pub mark_price: f64,
    pub mark_iv: f64,
    pub main: LegQuote,
    pub paired: Option<LegQuote>,
}

/// Inputs for sizing an open request from the quote amount paid in.
#[derive(Debug, Clone, Copy)]
pub struct OpenSizeInput<'a> {
    pub facts: &'a InstrumentFacts,
    pub market: &'a MarketContext,
    pub mark_price: f64,
    pub quote_asset: QuoteAsset,
    /// Raw quote-token units.
    pub quote_amount: u128,
}

/// Inputs for one risk premium evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RiskPremiumInput<'a> {
    pub underlying: UnderlyingAsset,
    pub expiry: i64,
    pub as_of: i64,
    pub is_open: bool,
    pub is_buy: bool,
    pub is_call: bool,
    pub main: LegQuote,
    pub paired: Option<LegQuote>,
    pub size: f64,
    pub underlying_futures: f64,
    pub spot_index: f64,
    pub volatility_score: f64,
    pub tranche: Tranche,
    /// Current Greeks of `tranche` on `underlying`.
    pub pool_greeks: Greeks,
    /// Current utility ratios of every tranche.
    pub utility_ratios: &'a UtilityRatios,
}

/// Risk premium result and the state transition the trade implies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPremiumOutcome {
    pub rate: f64,
    /// Greeks of the trader's side of the trade.
    pub trade_greeks: Greeks,
    pub next_utility_ratios: UtilityRatios,
    pub moneyness: f64,
    /// Pool delta/vega/theta after the trade.
    pub g1: [f64; 3],
    /// Unit delta/vega/theta.
    pub unit_greeks: [f64; 3],
    pub ur1: f64,
    pub ur_multiplier: f64,
}

pub trait PricingModel: Send + Sync {
    /// Human-readable model name for logs.
    fn name(&self) -> &str;

    fn fee_schedule(&self) -> &FeeSchedule;

    /// Expiry-matched futures level for `asset`.
    fn underlying_futures(
        &self,
        market: &MarketContext,
        asset: UnderlyingAsset,
        expiry: i64,
    ) -> Result<f64, PricingError>;

    /// Mark price and IV of an instrument (spread marks net the legs).
    fn mark_quote(
        &self,
        market: &MarketContext,
        facts: &InstrumentFacts,
        underlying_futures: f64,
    ) -> Result<MarkQuote, PricingError>;

    /// Provisional size bought or sold with the quote amount.
    fn estimate_open_size(&self, input: &OpenSizeInput<'_>) -> Result<f64, PricingError>;

    /// Quote amount left after the open fee, raw units. Zero when the fee
    /// exceeds the amount.
    fn open_amount_after_fee(
        &self,
        input: &OpenSizeInput<'_>,
        estimated_size: f64,
    ) -> Result<f64, PricingError>;

    fn risk_premium(&self, input: &RiskPremiumInput<'_>) -> Result<RiskPremiumOutcome, PricingError>;
}
