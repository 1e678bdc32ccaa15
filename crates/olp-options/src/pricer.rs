//! # Sequential Pricer
//!
//! Prices a batch of position requests strictly in ledger order against an
//! exclusively owned [`PoolRiskState`].
//!
//! ## Description
//! Each request is priced against the pool state left behind by the
//! requests before it in the same batch. After a request is priced its
//! trade Greeks are folded into the pool (subtracted on open, added on
//! close) and every tranche's utility ratio is replaced by the model's
//! next-state, before the next request is looked at.
//!
//! ## Batch Policy
//! 1. `Pending` halts iteration; nothing after it is priced
//! 2. `Cancelled` and `Executed` are skipped but advance the cursor
//! 3. Any error aborts the whole batch; the partially mutated state is
//!    dropped with the pricer
//!
//! [`price_single`] is the pure forward path shared with the inverse size
//! solver. It never mutates state.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::PricingError;
use crate::model::{MarkQuote, OpenSizeInput, PricingModel, RiskPremiumInput, RiskPremiumOutcome};
use crate::pricing::days_to_expiry;
use crate::quantize::{premium_defaults, MarkPriceTicks, PriceQuantizer, RiskPremiumTicks};
use crate::token_id::{self, InstrumentFacts};
use olp_models::asset::from_raw;
use olp_models::{
    AssetRegistry, Greeks, MarketContext, PoolRiskState, PositionRequest, QuoteAsset, RequestStatus,
    UtilityRatio,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// How the size of a forward quote is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Open paid with `amount` raw units of `quote_asset`.
    OpenAmount { quote_asset: QuoteAsset, amount: u128 },
    /// Close of `raw` underlying units.
    CloseRaw(u128),
    /// Caller-chosen size in underlying units.
    Exact(f64),
}

#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub facts: InstrumentFacts,
    pub is_open: bool,
    pub sizing: Sizing,
}

/// Everything the forward path computes for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardQuote {
    pub size: f64,
    pub estimated_size: Option<f64>,
    pub underlying_futures: f64,
    pub spot_index: f64,
    pub mark: MarkQuote,
    pub risk_premium_rate: f64,
    /// `mark * rate` as computed.
    pub risk_premium_raw: f64,
    /// `risk_premium_raw`, or the default when it is below one tick.
    pub risk_premium: f64,
    pub premium_defaulted: bool,
    pub fee_usd: f64,
    pub days_to_expiry: f64,
    pub pool_greeks_before: Greeks,
    pub utility_before: UtilityRatio,
    pub outcome: RiskPremiumOutcome,
}

impl ForwardQuote {
    /// Mark plus premium for buys, minus for sells.
    pub fn execution_price(&self, is_buy: bool) -> f64 {
        if is_buy {
            self.mark.mark_price + self.risk_premium
        } else {
            self.mark.mark_price - self.risk_premium
        }
    }
}

fn ensure_finite(what: &'static str, value: f64) -> Result<f64, PricingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PricingError::InvalidValue { what, value })
    }
}

/// Prices one request against a read-only pool state.
///
/// # Parameters
/// * `model` - Pricing model
/// * `market` - Immutable market snapshot
/// * `state` - Pool state to price against; never mutated
/// * `request` - Instrument, direction and sizing
/// * `default_premium` - Premium substituted for a zero or non-finite one
///
/// # Returns
/// [`ForwardQuote`] with size, mark, risk premium, fee and the model's
/// state transition, or the first [`PricingError`] hit.
pub fn price_single<M: PricingModel + ?Sized>(
    model: &M,
    market: &MarketContext,
    state: &PoolRiskState,
    request: &QuoteRequest,
    default_premium: f64,
) -> Result<ForwardQuote, PricingError> {
    let facts = &request.facts;
    let strategy = facts.strategy;

    let underlying_futures = ensure_finite(
        "underlying futures",
        model.underlying_futures(market, facts.underlying, facts.expiry)?,
    )?;
    let spot_index = market.underlying_spot(facts.underlying)?;
    let mark = model.mark_quote(market, facts, underlying_futures)?;
    ensure_finite("mark price", mark.mark_price)?;

    let (size, estimated_size) = match request.sizing {
        Sizing::OpenAmount { quote_asset, amount } => {
            if amount == 0 {
                return Err(PricingError::ZeroQuoteAmount);
            }
            let input = OpenSizeInput {
                facts,
                market,
                mark_price: mark.mark_price,
                quote_asset,
                quote_amount: amount,
            };
            let estimated = ensure_finite("estimated size", model.estimate_open_size(&input)?)?;
            let after_fee = model.open_amount_after_fee(&input, estimated)?;
            // haircut scales the estimate proportionally
            (estimated * after_fee / amount as f64, Some(estimated))
        }
        Sizing::CloseRaw(raw) => (from_raw(raw, facts.underlying.decimals()), None),
        Sizing::Exact(size) => (size, None),
    };
    let size = ensure_finite("size", size)?;
    if size < 0.0 {
        return Err(PricingError::InvalidValue { what: "size", value: size });
    }

    let pool_greeks_before = state.greeks(facts.tranche, facts.underlying);
    let utility_before = state.utility_ratio(facts.tranche);
    let input = RiskPremiumInput {
        underlying: facts.underlying,
        expiry: facts.expiry,
        as_of: market.as_of,
        is_open: request.is_open,
        is_buy: strategy.is_buy(),
        is_call: strategy.is_call(),
        main: mark.main,
        paired: mark.paired,
        size,
        underlying_futures,
        spot_index,
        volatility_score: market.volatility_score(facts.underlying),
        tranche: facts.tranche,
        pool_greeks: pool_greeks_before,
        utility_ratios: state.utility_ratios(),
    };
    let outcome = model.risk_premium(&input)?;
    if !outcome.trade_greeks.is_finite() {
        return Err(PricingError::InvalidValue {
            what: "trade greeks",
            value: outcome.trade_greeks.delta,
        });
    }

    let risk_premium_raw = mark.mark_price * outcome.rate;
    let premium_defaulted = premium_defaults(risk_premium_raw);
    let risk_premium = if premium_defaulted { default_premium } else { risk_premium_raw };

    let fees = model.fee_schedule();
    let fee_rate = fees.rate_for(strategy, request.is_open);
    let fee_usd = fees.trade_fee(spot_index, size, fee_rate, mark.mark_price * size);

    Ok(ForwardQuote {
        size,
        estimated_size,
        underlying_futures,
        spot_index,
        mark,
        risk_premium_rate: outcome.rate,
        risk_premium_raw,
        risk_premium,
        premium_defaulted,
        fee_usd,
        days_to_expiry: days_to_expiry(market.as_of, facts.expiry),
        pool_greeks_before,
        utility_before,
        outcome,
    })
}

/// Audit superset carried alongside the committed values.
#[derive(Debug, Clone, Serialize)]
pub struct AuditFields {
    pub instrument_name: String,
    pub quote_asset: Option<QuoteAsset>,
    /// Human units; zero for closes.
    pub quote_amount: f64,
    /// Human units; zero for opens.
    pub close_size: f64,
    pub estimated_size: Option<f64>,
    pub underlying_futures: f64,
    pub spot_index: f64,
    pub mark_price: f64,
    pub mark_iv: f64,
    pub main_iv: f64,
    pub paired_iv: Option<f64>,
    pub risk_premium_rate: f64,
    pub risk_premium: f64,
    pub premium_defaulted: bool,
    pub moneyness: f64,
    pub days_to_expiry: f64,
    pub greeks_before: Greeks,
    pub trade_greeks: Greeks,
    pub greeks_after: Greeks,
    pub g1: [f64; 3],
    pub unit_greeks: [f64; 3],
    pub utility_before: UtilityRatio,
    pub utility_after: UtilityRatio,
    pub ur1: f64,
    pub ur_multiplier: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricedRequest {
    pub request: PositionRequest,
    pub facts: InstrumentFacts,
    pub size: f64,
    pub mark_price: MarkPriceTicks,
    pub risk_premium: RiskPremiumTicks,
    pub fee_usd: f64,
    pub audit: AuditFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Cancelled,
    AlreadyExecuted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::AlreadyExecuted => "executed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedRequest {
    pub index: u64,
    pub reason: SkipReason,
}

/// Result of pricing one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PricedBatch {
    pub priced: Vec<PricedRequest>,
    pub skipped: Vec<SkippedRequest>,
    /// Index of the first unconsumed request.
    pub cursor_after: u64,
    /// Index of the pending request that stopped iteration.
    pub halted_at: Option<u64>,
}

impl PricedBatch {
    pub fn mark_price_ticks(&self) -> Vec<u32> {
        self.priced.iter().map(|p| p.mark_price.get()).collect()
    }

    pub fn risk_premium_ticks(&self) -> Vec<u32> {
        self.priced.iter().map(|p| p.risk_premium.get()).collect()
    }
}

/// Stateful, single-threaded batch pricer.
///
/// # Description
/// Owns the batch's [`PoolRiskState`] by value and only hands out shared
/// references to it, so no other code can observe or change the state
/// while a batch is being priced. A pricer serves exactly one batch.
pub struct SequentialPricer<'a, M: PricingModel + ?Sized> {
    model: &'a M,
    market: &'a MarketContext,
    registry: &'a AssetRegistry,
    quantizer: PriceQuantizer,
    state: PoolRiskState,
}

impl<'a, M: PricingModel + ?Sized> SequentialPricer<'a, M> {
    pub fn new(
        model: &'a M,
        market: &'a MarketContext,
        registry: &'a AssetRegistry,
        quantizer: PriceQuantizer,
        state: PoolRiskState,
    ) -> Self {
        Self { model, market, registry, quantizer, state }
    }

    pub fn state(&self) -> &PoolRiskState {
        &self.state
    }

    pub fn into_state(self) -> PoolRiskState {
        self.state
    }

    /// Prices `requests` in order starting from `cursor`.
    ///
    /// # Returns
    /// [`PricedBatch`] with one [`PricedRequest`] per `Ready` request
    /// processed before the first `Pending` one, or the first error.
    pub fn price_batch(
        &mut self,
        requests: &[PositionRequest],
        cursor: u64,
    ) -> Result<PricedBatch, PricingError> {
        let mut batch = PricedBatch { cursor_after: cursor, ..Default::default() };
        let mut previous: Option<u64> = None;

        for request in requests {
            if let Some(prev) = previous {
                if request.index <= prev {
                    return Err(PricingError::OutOfOrder { previous: prev, next: request.index });
                }
            }
            previous = Some(request.index);

            let reason = match request.status {
                RequestStatus::Pending => {
                    info!("[PRICER] Request {} pending, halting batch", request.index);
                    batch.halted_at = Some(request.index);
                    break;
                }
                RequestStatus::Cancelled => Some(SkipReason::Cancelled),
                RequestStatus::Executed => {
                    warn!("[PRICER] Request {} already executed, skipping", request.index);
                    Some(SkipReason::AlreadyExecuted)
                }
                RequestStatus::Ready => None,
            };

            if let Some(reason) = reason {
                metrics::counter!("olp_requests_skipped_total", "reason" => reason.as_str()).increment(1);
                batch.skipped.push(SkippedRequest { index: request.index, reason });
            } else {
                let priced = self.price_request(request)?;
                batch.priced.push(priced);
            }
            batch.cursor_after = request.index + 1;
        }

        Ok(batch)
    }

    /// Prices one `Ready` request and applies its state transition.
    pub fn price_request(&mut self, request: &PositionRequest) -> Result<PricedRequest, PricingError> {
        let facts = token_id::decode(&request.instrument_id)
            .map_err(|source| PricingError::Decode { index: request.index, source })?;

        let (sizing, quote_asset) = if request.is_open {
            let quote_asset = self.registry.resolve(request.quote_path())?;
            (Sizing::OpenAmount { quote_asset, amount: request.amount_or_size }, Some(quote_asset))
        } else {
            (Sizing::CloseRaw(request.amount_or_size), None)
        };
        let query = QuoteRequest { facts, is_open: request.is_open, sizing };

        let quote = price_single(
            self.model,
            self.market,
            &self.state,
            &query,
            self.quantizer.default_risk_premium_value(),
        )?;
        let mark_price = self.quantizer.mark_price(quote.mark.mark_price)?;
        let (risk_premium, premium_defaulted) = self.quantizer.guarded_risk_premium(quote.risk_premium_raw)?;

        // every fallible step is done; from here on the pool moves
        let facts = query.facts;
        let outcome = &quote.outcome;
        self.state
            .apply_trade(facts.tranche, facts.underlying, &outcome.trade_greeks, request.is_open);
        self.state.set_utility_ratios(outcome.next_utility_ratios.clone());

        let audit = AuditFields {
            instrument_name: facts.leg_name(facts.main_leg()),
            quote_asset,
            quote_amount: quote_asset
                .map(|asset| from_raw(request.amount_or_size, asset.decimals()))
                .unwrap_or(0.0),
            close_size: if request.is_open { 0.0 } else { quote.size },
            estimated_size: quote.estimated_size,
            underlying_futures: quote.underlying_futures,
            spot_index: quote.spot_index,
            mark_price: quote.mark.mark_price,
            mark_iv: quote.mark.mark_iv,
            main_iv: quote.mark.main.mark_iv,
            paired_iv: quote.mark.paired.map(|leg| leg.mark_iv),
            risk_premium_rate: quote.risk_premium_rate,
            risk_premium: if premium_defaulted {
                self.quantizer.default_risk_premium_value()
            } else {
                quote.risk_premium_raw
            },
            premium_defaulted,
            moneyness: outcome.moneyness,
            days_to_expiry: quote.days_to_expiry,
            greeks_before: quote.pool_greeks_before,
            trade_greeks: outcome.trade_greeks,
            greeks_after: self.state.greeks(facts.tranche, facts.underlying),
            g1: outcome.g1,
            unit_greeks: outcome.unit_greeks,
            utility_before: quote.utility_before,
            utility_after: self.state.utility_ratio(facts.tranche),
            ur1: outcome.ur1,
            ur_multiplier: outcome.ur_multiplier,
        };

        let side = if request.is_open { "open" } else { "close" };
        metrics::counter!("olp_requests_priced_total", "side" => side).increment(1);
        debug!(
            "[PRICER] #{} {} {} size={:.6} mark={} rp={} fee_usd={:.4}",
            request.index,
            side,
            audit.instrument_name,
            quote.size,
            mark_price.get(),
            risk_premium.get(),
            quote.fee_usd
        );

        Ok(PricedRequest {
            request: request.clone(),
            facts,
            size: quote.size,
            mark_price,
            risk_premium,
            fee_usd: quote.fee_usd,
            audit,
        })
    }
}
