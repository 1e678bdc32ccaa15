//! # Inverse Size Solver
//!
//! Finds the spread size whose required collateral matches a target.
//!
//! ## Description
//! Collateral as a function of size has no closed-form inverse (fee caps
//! and the default premium make it piecewise), so the solver bisects over
//! `[low, high]` and keeps the best midpoint seen. It never fails: invalid
//! input or a pricing error at a midpoint degrade the answer, and the
//! [`SolveOutcome`] says how good it is.
//!
//! Every evaluation goes through [`price_single`] against a borrowed pool
//! snapshot, so solving is a pure query.
//!
//! ## References
//! - Burden, R. L., & Faires, J. D. Numerical Analysis, ch. 2.1 (bisection)
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::model::PricingModel;
use crate::pricer::{price_single, QuoteRequest, Sizing};
use crate::token_id::{self, spread_legs, InstrumentFacts};
use olp_models::{MarketContext, PoolRiskState, QuoteAsset, Tranche, UnderlyingAsset};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub low: f64,
    pub high: f64,
    pub max_iterations: u32,
    /// Stop once `|collateral - target|` is below this.
    pub tolerance: f64,
    /// Stop once the bracket is narrower than this.
    pub min_width: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            low: 1e-8,
            high: 100.0,
            max_iterations: 100,
            tolerance: 1e-4,
            min_width: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveOutcome {
    /// Best size found, always inside `[low, high]`.
    pub size: f64,
    /// `|collateral(size) - target|`, infinite if nothing evaluated.
    pub best_diff: f64,
    pub iterations: u32,
    pub converged: bool,
    /// Best diff after each iteration.
    pub trace: Vec<f64>,
}

/// Collateral query for a vertical spread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollateralQuery {
    pub underlying: UnderlyingAsset,
    pub expiry: i64,
    pub strikes: [u64; 2],
    pub is_call: bool,
    pub is_buy: bool,
    /// Target collateral in USDC.
    pub target_collateral: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InverseSizeSolver {
    config: SolverConfig,
}

impl InverseSizeSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn give_up(&self) -> SolveOutcome {
        SolveOutcome {
            size: self.config.low,
            best_diff: f64::INFINITY,
            iterations: 0,
            converged: false,
            trace: Vec::new(),
        }
    }

    /// Bisects for `f(size) ≈ target`, assuming `f` is non-decreasing.
    ///
    /// # Parameters
    /// * `target` - Desired value of `f`
    /// * `f` - Evaluation at a size; `None` marks a failed evaluation,
    ///   treated as overshooting so the bracket moves down
    pub fn bisect<F>(&self, target: f64, mut f: F) -> SolveOutcome
    where
        F: FnMut(f64) -> Option<f64>,
    {
        let SolverConfig { low, high, max_iterations, tolerance, min_width } = self.config;
        if !target.is_finite() || !(low < high) || !low.is_finite() || !high.is_finite() {
            return self.give_up();
        }

        let (mut lo, mut hi) = (low, high);
        let mut best = SolveOutcome {
            size: low,
            best_diff: f64::INFINITY,
            iterations: 0,
            converged: false,
            trace: Vec::with_capacity(max_iterations as usize),
        };

        for _ in 0..max_iterations {
            let mid = (lo + hi) / 2.0;
            best.iterations += 1;

            let value = f(mid).filter(|v| v.is_finite());
            let diff = value.map(|v| (v - target).abs()).unwrap_or(f64::INFINITY);
            if diff < best.best_diff {
                best.best_diff = diff;
                best.size = mid;
            }
            best.trace.push(best.best_diff);

            match value {
                Some(v) if v < target => lo = mid,
                _ => hi = mid,
            }

            if diff < tolerance || (hi - lo) < min_width {
                break;
            }
        }

        best.converged = best.best_diff < tolerance;
        best
    }

    /// Size of a spread whose collateral plus fee equals
    /// `query.target_collateral`.
    ///
    /// # Description
    /// Prices against the short tranche of `state`, which is only read.
    pub fn solve_size_for_collateral<M: PricingModel + ?Sized>(
        &self,
        model: &M,
        market: &MarketContext,
        state: &PoolRiskState,
        query: &CollateralQuery,
        default_premium: f64,
    ) -> SolveOutcome {
        let (facts, usdc) = match spread_inputs(market, query) {
            Some(inputs) => inputs,
            None => return self.give_up(),
        };

        let outcome = self.bisect(query.target_collateral, |size| {
            collateral_at(model, market, state, &facts, query.is_buy, size, usdc, default_premium)
        });
        debug!(
            "[SOLVER] target={} size={:.8} diff={:.6} iterations={} converged={}",
            query.target_collateral, outcome.size, outcome.best_diff, outcome.iterations, outcome.converged
        );
        outcome
    }

    /// Collateral plus fee, in USDC, for opening `size` of the spread.
    ///
    /// The forward side of [`Self::solve_size_for_collateral`];
    /// `query.target_collateral` is ignored. `None` when the spread or the
    /// market data cannot be priced.
    pub fn collateral_for_size<M: PricingModel + ?Sized>(
        &self,
        model: &M,
        market: &MarketContext,
        state: &PoolRiskState,
        query: &CollateralQuery,
        size: f64,
        default_premium: f64,
    ) -> Option<f64> {
        let (facts, usdc) = spread_inputs(market, query)?;
        collateral_at(model, market, state, &facts, query.is_buy, size, usdc, default_premium)
    }
}

fn spread_inputs(market: &MarketContext, query: &CollateralQuery) -> Option<(InstrumentFacts, f64)> {
    let legs = spread_legs(query.strikes, query.is_call, query.is_buy);
    let id = token_id::encode(query.underlying, query.expiry, &legs, Tranche::Short).ok()?;
    let facts = token_id::decode(&id).ok()?;
    let usdc = market.spot(QuoteAsset::Usdc.spot_key()).ok().filter(|price| *price > 0.0)?;
    Some((facts, usdc))
}

/// Collateral (USDC) needed to open `size` of the spread, fee included.
#[allow(clippy::too_many_arguments)]
fn collateral_at<M: PricingModel + ?Sized>(
    model: &M,
    market: &MarketContext,
    state: &PoolRiskState,
    facts: &InstrumentFacts,
    is_buy: bool,
    size: f64,
    usdc: f64,
    default_premium: f64,
) -> Option<f64> {
    let request = QuoteRequest { facts: facts.clone(), is_open: true, sizing: Sizing::Exact(size) };
    let quote = price_single(model, market, state, &request, default_premium).ok()?;

    let fees = model.fee_schedule();
    let notional = size * quote.execution_price(is_buy);
    let fee = fees.trade_fee(quote.spot_index, size, fees.open_combo, notional);

    let strikes = facts.strikes();
    let width = (strikes[0] - strikes[1]).abs();
    let amount = ((size * width / usdc) * 1e6).round() / 1e6;
    Some((amount * usdc + fee) / usdc)
}
