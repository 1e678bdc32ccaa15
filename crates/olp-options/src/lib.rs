//! # OLP Options
//!
//! Pricing side of the position keeper.
//!
//! ## Description
//! - [`token_id`] - 256-bit instrument id codec and derived instrument facts
//! - [`pricing`] - Black-Scholes helpers on futures (mark price, Greeks)
//! - [`model`] - the [`PricingModel`] seam and its input/output types
//! - [`reference`] - [`ReferenceModel`], the in-tree risk premium model
//! - [`fees`] - trade fee schedule with notional cap
//! - [`quantize`] - fixed-point price conversion for commit payloads
//! - [`pricer`] - forward single-request pricing and the [`SequentialPricer`]
//! - [`solver`] - bisection [`InverseSizeSolver`] for collateral to size
//!
//! ## References
//! - Black, F. (1976). The Pricing of Commodity Contracts.
//!   Journal of Financial Economics, 3, 167-179.
//! - IEEE Std 1016-2009: Software Design Descriptions

pub mod error;
pub mod fees;
pub mod model;
pub mod pricer;
pub mod pricing;
pub mod quantize;
pub mod reference;
pub mod solver;
pub mod token_id;

pub use error::{CodecError, PricingError};
pub use fees::FeeSchedule;
pub use model::{LegQuote, MarkQuote, OpenSizeInput, PricingModel, RiskPremiumInput, RiskPremiumOutcome};
pub use pricer::{
    price_single, AuditFields, ForwardQuote, PricedBatch, PricedRequest, QuoteRequest, SequentialPricer,
    SkipReason, SkippedRequest, Sizing,
};
pub use quantize::{premium_defaults, MarkPriceTicks, PriceQuantizer, RiskPremiumTicks, DEFAULT_RISK_PREMIUM_TICKS};
pub use reference::{ReferenceModel, RiskPremiumParams};
pub use solver::{CollateralQuery, InverseSizeSolver, SolveOutcome, SolverConfig};
pub use token_id::{InstrumentFacts, OptionLeg};
