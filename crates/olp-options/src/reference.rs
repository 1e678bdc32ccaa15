//! # Reference Pricing Model
//!
//! In-tree implementation of [`PricingModel`].
//!
//! ## Description
//! Marks come from the market snapshot's instrument table; unlisted
//! strikes borrow the IV of the nearest listed strike and are repriced
//! with Black-76. The risk premium rate grows with the pool's post-trade
//! exposure (unit Greeks), the option's moneyness and the tranche's
//! utilization:
//!
//! ```text
//! rate = total * Σ(|UG_i| * w_i * damp_i) * rp_mul(moneyness, dte)
//!        * ur_mul(ur0, ur1) * asset_ratio * call_put_ratio
//! ```
//!
//! Sells are capped at `max_sell_rate`. When the trade grows the pool's
//! absolute delta (or flips its sign) the volatility score is added on top.
//!
//! ## Parameters
//! Every constant lives in [`RiskPremiumParams`] and can be overridden from
//! configuration.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::PricingError;
use crate::fees::FeeSchedule;
use crate::model::{LegQuote, MarkQuote, OpenSizeInput, PricingModel, RiskPremiumInput, RiskPremiumOutcome};
use crate::pricing::{black76_price, days_to_expiry, position_greeks, years_to_expiry};
use crate::token_id::{parse_instrument_name, InstrumentFacts, OptionLeg};
use olp_models::{Greeks, MarketContext, QuoteAsset, Strategy, UnderlyingAsset, UtilityRatio};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Term-bucketed weights: `[short, mid, long][delta, vega, theta]`.
pub type TermWeights = [[f64; 3]; 3];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPremiumParams {
    pub unit_percentage_min: f64,
    pub unit_percentage_max: f64,
    /// Deposit tiers (USD) used to scale small pools up.
    pub standard_sizes: [f64; 5],
    pub max_scale_factor: f64,
    pub weights: BTreeMap<UnderlyingAsset, TermWeights>,
    pub short_term_days: f64,
    pub mid_term_days: f64,
    /// Multiplier applied to a greek that shrinks the pool's exposure.
    pub reducing_damping: f64,
    /// `[a, b, c]` of `a / mul_ratio * (m + b)^2 + c` for dte ≤ 2, ≤ 7, longer.
    pub rp_mul: [[f64; 3]; 3],
    pub rp_mul_caps: [f64; 3],
    pub mul_ratio: f64,
    pub ur_threshold: f64,
    pub ur_initial_multiplier: f64,
    pub ur_max: f64,
    pub max_sell_rate: f64,
    pub total_ratio: f64,
    pub asset_ratio: BTreeMap<UnderlyingAsset, f64>,
    pub call_ratio: f64,
    pub put_ratio: f64,
    pub risk_free_min: f64,
    pub risk_free_max: f64,
}

impl Default for RiskPremiumParams {
    fn default() -> Self {
        let weights: TermWeights = [
            [0.0005, 0.002, 0.004],
            [0.0004, 0.0015, 0.003],
            [0.0003, 0.001, 0.002],
        ];
        Self {
            unit_percentage_min: 0.5,
            unit_percentage_max: 1.5,
            standard_sizes: [100_000.0, 500_000.0, 1_000_000.0, 5_000_000.0, 10_000_000.0],
            max_scale_factor: 10.0,
            weights: UnderlyingAsset::ALL.iter().map(|a| (*a, weights)).collect(),
            short_term_days: 7.0,
            mid_term_days: 30.0,
            reducing_damping: 0.1,
            rp_mul: [[2.0, -0.5, 1.0], [1.5, -0.5, 1.0], [1.0, -0.5, 1.0]],
            rp_mul_caps: [8.0, 8.0, 4.0],
            mul_ratio: 1.0,
            ur_threshold: 0.5,
            ur_initial_multiplier: 1.0,
            ur_max: 1.0,
            max_sell_rate: 0.05,
            total_ratio: 1.0,
            asset_ratio: UnderlyingAsset::ALL.iter().map(|a| (*a, 1.0)).collect(),
            call_ratio: 1.0,
            put_ratio: 1.0,
            risk_free_min: 0.03,
            risk_free_max: 0.18,
        }
    }
}

impl RiskPremiumParams {
    fn weight(&self, asset: UnderlyingAsset, dte: f64, greek: usize) -> f64 {
        let term = if dte <= self.short_term_days {
            0
        } else if dte <= self.mid_term_days {
            1
        } else {
            2
        };
        self.weights.get(&asset).map(|w| w[term][greek]).unwrap_or(0.0)
    }

    fn unit_percentage(&self, g0: f64, g1: f64) -> f64 {
        if g0 == 0.0 {
            self.unit_percentage_max
        } else {
            (g1 / g0).abs().clamp(self.unit_percentage_min, self.unit_percentage_max)
        }
    }

    fn scale_factor(&self, deposited_usd: f64) -> f64 {
        let tier = self.standard_sizes.iter().find(|size| deposited_usd < **size);
        let raw = match tier {
            Some(size) => size / deposited_usd,
            None => 1.0,
        };
        raw.clamp(1.0, self.max_scale_factor)
    }

    fn rp_multiplier(&self, moneyness: f64, dte: f64) -> f64 {
        let bucket = if dte <= 2.0 {
            0
        } else if dte <= 7.0 {
            1
        } else {
            2
        };
        let [a, b, c] = self.rp_mul[bucket];
        (a / self.mul_ratio * (moneyness + b).powi(2) + c).min(self.rp_mul_caps[bucket])
    }

    fn ur_multiplier(&self, ur0: f64, ur1: f64) -> f64 {
        if ur1 < self.ur_threshold {
            return self.ur_initial_multiplier;
        }
        let base = (ur1 - self.ur_threshold) * (ur1 + 1.0) + self.ur_initial_multiplier;
        if ur1 == 0.0 {
            return base * 2.0;
        }
        // ur0 == 0 gives +inf here, which the clamp turns into 2
        base * (ur1 / ur0).clamp(1.0, 2.0)
    }
}

/// Collateral the seller of `strategy` locks per unit, in USD.
fn unit_collateral_usd(strategy: Strategy, strikes: &[f64], spot: f64) -> f64 {
    match strategy {
        Strategy::SellCall => spot,
        Strategy::SellPut => strikes.first().copied().unwrap_or(0.0),
        Strategy::SellCallSpread | Strategy::SellPutSpread => match strikes {
            [low, high] => high - low,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceModel {
    fees: FeeSchedule,
    params: RiskPremiumParams,
}

impl ReferenceModel {
    pub fn new(fees: FeeSchedule, params: RiskPremiumParams) -> Self {
        Self { fees, params }
    }

    pub fn params(&self) -> &RiskPremiumParams {
        &self.params
    }

    fn leg_quote(
        &self,
        market: &MarketContext,
        facts: &InstrumentFacts,
        leg: &OptionLeg,
        underlying_futures: f64,
    ) -> LegQuote {
        let strike = leg.strike as f64;
        let name = facts.leg_name(leg);
        if let Some(mark) = market.instrument(&name) {
            return LegQuote { strike, mark_iv: mark.mark_iv, mark_price: mark.mark_price };
        }

        let date_code = facts.date_code();
        let mut listed: Vec<(f64, f64)> = market
            .instruments
            .iter()
            .filter_map(|(key, mark)| {
                let parsed = parse_instrument_name(key)?;
                let same_series = parsed.underlying == facts.underlying
                    && parsed.date_code == date_code
                    && parsed.is_call == leg.is_call;
                same_series.then_some((parsed.strike, mark.mark_iv))
            })
            .collect();
        if listed.is_empty() {
            return LegQuote { strike, mark_iv: 0.0, mark_price: 0.0 };
        }
        listed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mark_iv = nearest_strike_iv(&listed, strike, underlying_futures);
        let years = years_to_expiry(market.as_of, facts.expiry);
        let mark_price = black76_price(underlying_futures, strike, years, mark_iv, leg.is_call);
        LegQuote { strike, mark_iv, mark_price }
    }

    fn next_utility_ratios(&self, input: &RiskPremiumInput<'_>) -> olp_models::UtilityRatios {
        let mut next = input.utility_ratios.clone();
        let entry = next.entry(input.tranche).or_insert_with(UtilityRatio::default);

        let mark_price = match input.paired {
            Some(paired) => (input.main.mark_price - paired.mark_price).max(0.0),
            None => input.main.mark_price,
        };
        let premium = mark_price * input.size;

        // open sell and close buy only move premium
        if input.is_open != input.is_buy {
            entry.deposited_usd -= premium;
            return next;
        }

        let strategy = Strategy::compose(input.is_buy, input.is_call, input.paired.is_some());
        let locked = if input.is_open { strategy.opposite() } else { strategy };
        let mut strikes = vec![input.main.strike];
        if let Some(paired) = input.paired {
            strikes.push(paired.strike);
        }
        strikes.sort_by(f64::total_cmp);
        let collateral = unit_collateral_usd(locked, &strikes, input.spot_index) * input.size;

        entry.utilized_usd += collateral;
        entry.deposited_usd += premium;
        next
    }

    fn trade_greeks(&self, input: &RiskPremiumInput<'_>, years: f64) -> (Greeks, f64) {
        let main = position_greeks(
            input.underlying_futures,
            input.main.strike,
            years,
            input.main.mark_iv,
            input.is_call,
            input.is_buy,
            input.size,
        );
        let moneyness = position_greeks(
            input.underlying_futures,
            input.main.strike,
            years,
            input.main.mark_iv,
            input.is_call,
            input.is_buy,
            1.0,
        )
        .delta
        .abs();
        let paired = input
            .paired
            .map(|leg| {
                position_greeks(
                    input.underlying_futures,
                    leg.strike,
                    years,
                    leg.mark_iv,
                    input.is_call,
                    !input.is_buy,
                    input.size,
                )
            })
            .unwrap_or_default();
        (main + paired, moneyness)
    }
}

/// IV of the listed strike nearest to `target`. Ties go to the lower
/// strike when futures sit at or below the target.
fn nearest_strike_iv(listed: &[(f64, f64)], target: f64, futures: f64) -> f64 {
    let (first, last) = match (listed.first(), listed.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if target <= first.0 {
        return first.1;
    }
    if target >= last.0 {
        return last.1;
    }
    for pair in listed.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if target > lower.0 && target <= upper.0 {
            let to_lower = (target - lower.0).abs();
            let to_upper = (target - upper.0).abs();
            return if to_lower < to_upper {
                lower.1
            } else if to_lower > to_upper {
                upper.1
            } else if futures <= target {
                lower.1
            } else {
                upper.1
            };
        }
    }
    last.1
}

impl PricingModel for ReferenceModel {
    fn name(&self) -> &str {
        "reference"
    }

    fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    fn underlying_futures(
        &self,
        market: &MarketContext,
        asset: UnderlyingAsset,
        expiry: i64,
    ) -> Result<f64, PricingError> {
        let futures_index = market.futures_index(asset)?;
        let (lo, hi) = (self.params.risk_free_min, self.params.risk_free_max);

        let mut curve = market.rate_curve(asset).to_vec();
        curve.sort_by_key(|point| point.expiry);
        let rate = match curve.iter().find(|point| point.expiry >= expiry).or(curve.last()) {
            Some(point) => point.rate.clamp(lo, hi),
            None => (lo + hi) / 2.0,
        };

        Ok(futures_index * (1.0 + rate * years_to_expiry(market.as_of, expiry)))
    }

    fn mark_quote(
        &self,
        market: &MarketContext,
        facts: &InstrumentFacts,
        underlying_futures: f64,
    ) -> Result<MarkQuote, PricingError> {
        let main = self.leg_quote(market, facts, facts.main_leg(), underlying_futures);
        let paired = facts
            .paired_leg()
            .map(|leg| self.leg_quote(market, facts, leg, underlying_futures));
        let (mark_price, mark_iv) = match paired {
            Some(p) => ((main.mark_price - p.mark_price).max(0.0), (main.mark_iv + p.mark_iv) / 2.0),
            None => (main.mark_price, main.mark_iv),
        };
        Ok(MarkQuote { mark_price, mark_iv, main, paired })
    }

    fn estimate_open_size(&self, input: &OpenSizeInput<'_>) -> Result<f64, PricingError> {
        let facts = input.facts;
        let amount = input.quote_amount as f64;

        if facts.strategy.is_buy() {
            let quote_spot = input.market.spot(input.quote_asset.spot_key())?;
            let amount_usd = amount / 10f64.powi(input.quote_asset.decimals() as i32) * quote_spot;
            return Ok(amount_usd / input.mark_price);
        }

        let unit_amount = match facts.strategy {
            Strategy::SellCall => 10f64.powi(facts.underlying.decimals() as i32),
            strategy => {
                let usdc_spot = input.market.spot(QuoteAsset::Usdc.spot_key())?;
                let usd = unit_collateral_usd(strategy, &facts.strikes(), 0.0);
                usd / usdc_spot * 10f64.powi(QuoteAsset::Usdc.decimals() as i32)
            }
        };
        Ok(amount / unit_amount)
    }

    fn open_amount_after_fee(
        &self,
        input: &OpenSizeInput<'_>,
        estimated_size: f64,
    ) -> Result<f64, PricingError> {
        let facts = input.facts;
        let spot = input.market.underlying_spot(facts.underlying)?;
        let rate = self.fees.rate_for(facts.strategy, true);
        let fee_usd = self
            .fees
            .trade_fee(spot, estimated_size, rate, input.mark_price * estimated_size);

        let quote_spot = input.market.spot(input.quote_asset.spot_key())?;
        let fee_amount = fee_usd / quote_spot * 10f64.powi(input.quote_asset.decimals() as i32);

        let amount = input.quote_amount as f64;
        if amount < fee_amount {
            return Ok(0.0);
        }
        Ok(amount - fee_amount)
    }

    fn risk_premium(&self, input: &RiskPremiumInput<'_>) -> Result<RiskPremiumOutcome, PricingError> {
        let p = &self.params;
        let dte = days_to_expiry(input.as_of, input.expiry);
        let years = years_to_expiry(input.as_of, input.expiry);

        let (trade_greeks, moneyness) = self.trade_greeks(input, years);
        let next_utility_ratios = self.next_utility_ratios(input);

        let g0 = input.pool_greeks.risk_components();
        let trade = trade_greeks.risk_components();
        let g1: [f64; 3] = std::array::from_fn(|i| {
            if input.is_open { g0[i] - trade[i] } else { g0[i] + trade[i] }
        });

        let mut outcome = RiskPremiumOutcome {
            rate: 0.0,
            trade_greeks,
            next_utility_ratios,
            moneyness,
            g1,
            unit_greeks: [0.0; 3],
            ur1: 0.0,
            ur_multiplier: 0.0,
        };

        let current = input.utility_ratios.get(&input.tranche).copied().unwrap_or_default();
        let deposited = current.deposited_usd;
        let futures = input.underlying_futures;
        if deposited == 0.0 || futures == 0.0 {
            return Ok(outcome);
        }

        let up: [f64; 3] = std::array::from_fn(|i| p.unit_percentage(g0[i], g1[i]));
        let scale = p.scale_factor(deposited);
        let unit = futures * 0.01;
        let ug = [
            (unit * g1[0].abs() * scale).sqrt() * up[0],
            ((g1[1] * scale).abs() / unit).sqrt() * up[1],
            ((g1[2] * scale).abs() / unit).sqrt() * up[2],
        ];
        outcome.unit_greeks = ug;

        if dte <= 0.0 {
            return Ok(outcome);
        }

        let reduces = |i: usize| g0[i] * g1[i] >= 0.0 && g0[i].abs() >= g1[i].abs();
        let base_rp: f64 = (0..3)
            .map(|i| {
                let rp = ug[i].abs() * p.weight(input.underlying, dte, i);
                if reduces(i) { rp * p.reducing_damping } else { rp }
            })
            .sum();

        let next = outcome
            .next_utility_ratios
            .get(&input.tranche)
            .copied()
            .unwrap_or_default();
        let ur0 = current.ratio(p.ur_max);
        let ur1 = next.ratio(p.ur_max);
        let ur_multiplier = p.ur_multiplier(ur0, ur1);
        outcome.ur1 = ur1;
        outcome.ur_multiplier = ur_multiplier;

        let asset_ratio = p.asset_ratio.get(&input.underlying).copied().unwrap_or(1.0);
        let direction_ratio = if input.is_call { p.call_ratio } else { p.put_ratio };
        let rate_buy = p.total_ratio
            * base_rp
            * p.rp_multiplier(moneyness, dte)
            * ur_multiplier
            * asset_ratio
            * direction_ratio;
        let rate_sell = rate_buy.min(p.max_sell_rate);

        let volatility_add = if reduces(0) { 0.0 } else { input.volatility_score / 100.0 };
        let side_rate = if input.is_buy { rate_buy } else { rate_sell };
        outcome.rate = side_rate + volatility_add;

        Ok(outcome)
    }
}
