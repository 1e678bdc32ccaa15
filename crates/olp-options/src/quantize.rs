//! # Price Quantizer
//!
//! Fixed-point conversion of pricing outputs for the commit payload.
//!
//! ## Description
//! Prices are committed as integers with three implied decimals:
//! `floor(x * 1000)`. Each committed lane is a 32-bit word capped at 2^31.
//!
//! Mark prices may legitimately be zero (a worthless spread) but must be
//! finite. Risk premiums are never committed as zero: a NaN, zero or
//! negative quantized premium is replaced by the configured default. The
//! newtypes below can only be built through [`PriceQuantizer`], so every
//! value that reaches a payload has passed these checks.

use crate::error::PricingError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Implied decimals of committed prices.
pub const PRICE_SCALE: f64 = 1000.0;
/// Largest value a price lane may carry.
pub const MAX_PRICE_TICKS: u64 = 1 << 31;
/// $0.002 at three implied decimals.
pub const DEFAULT_RISK_PREMIUM_TICKS: u32 = 2;

/// `floor(x * 1000)`, `None` for NaN.
pub fn quantize(x: f64) -> Option<f64> {
    let q = (x * PRICE_SCALE).floor();
    if q.is_nan() { None } else { Some(q) }
}

/// Quantized, range-checked mark price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MarkPriceTicks(u32);

impl MarkPriceTicks {
    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Quantized risk premium, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RiskPremiumTicks(NonZeroU32);

impl RiskPremiumTicks {
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuantizer {
    default_risk_premium: NonZeroU32,
}

impl Default for PriceQuantizer {
    fn default() -> Self {
        Self::new(NonZeroU32::MIN.saturating_add(DEFAULT_RISK_PREMIUM_TICKS - 1))
    }
}

impl PriceQuantizer {
    pub fn new(default_risk_premium: NonZeroU32) -> Self {
        Self { default_risk_premium }
    }

    /// Builds a quantizer from a configured tick count; zero falls back to
    /// [`DEFAULT_RISK_PREMIUM_TICKS`].
    pub fn with_default_ticks(ticks: u32) -> Self {
        match NonZeroU32::new(ticks) {
            Some(ticks) => Self::new(ticks),
            None => Self::default(),
        }
    }

    pub fn default_risk_premium(&self) -> RiskPremiumTicks {
        RiskPremiumTicks(self.default_risk_premium)
    }

    /// Default premium in price units.
    pub fn default_risk_premium_value(&self) -> f64 {
        self.default_risk_premium.get() as f64 / PRICE_SCALE
    }

    pub fn mark_price(&self, price: f64) -> Result<MarkPriceTicks, PricingError> {
        let q = quantize(price).ok_or(PricingError::InvalidValue { what: "mark price", value: price })?;
        if !q.is_finite() || q < 0.0 {
            return Err(PricingError::InvalidValue { what: "mark price", value: price });
        }
        if q > MAX_PRICE_TICKS as f64 {
            return Err(PricingError::PriceOutOfRange(price));
        }
        Ok(MarkPriceTicks(q as u32))
    }

    pub fn risk_premium(&self, premium: f64) -> Result<RiskPremiumTicks, PricingError> {
        self.guarded_risk_premium(premium).map(|(ticks, _)| ticks)
    }

    /// Quantized premium and whether the default replaced it.
    pub fn guarded_risk_premium(&self, premium: f64) -> Result<(RiskPremiumTicks, bool), PricingError> {
        if premium_defaults(premium) {
            return Ok((self.default_risk_premium(), true));
        }
        let q = (premium * PRICE_SCALE).floor();
        if q > MAX_PRICE_TICKS as f64 {
            return Err(PricingError::PriceOutOfRange(premium));
        }
        match NonZeroU32::new(q as u32) {
            Some(ticks) => Ok((RiskPremiumTicks(ticks), false)),
            None => Ok((self.default_risk_premium(), true)),
        }
    }
}

/// True when `premium` falls below one tick (zero, negative, NaN or under
/// 0.001) and the default premium is committed instead.
pub fn premium_defaults(premium: f64) -> bool {
    !matches!(quantize(premium), Some(q) if q >= 1.0)
}
