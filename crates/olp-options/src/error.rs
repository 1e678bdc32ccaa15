//! Error types for decoding and pricing.

use olp_models::ModelError;
use thiserror::Error;

/// Instrument id could not be decoded or encoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("leg count {0} is not supported")]
    InvalidLegCount(usize),
    #[error("leg {0} has a zero strike")]
    ZeroStrike(usize),
    #[error("strike {0} does not fit in 46 bits")]
    StrikeOverflow(u64),
    #[error("expiry {0} does not fit in 40 bits")]
    ExpiryOutOfRange(i64),
    #[error("legs do not form a supported strategy")]
    UnsupportedLegs,
    #[error("encoded strategy {encoded} disagrees with legs ({derived})")]
    StrategyMismatch { encoded: String, derived: String },
}

/// Failure inside the forward pricing path. Any of these aborts a batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("request {index}: {source}")]
    Decode { index: u64, source: CodecError },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Market(#[from] ModelError),
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: f64 },
    #[error("open request with zero quote amount")]
    ZeroQuoteAmount,
    #[error("price {0} exceeds the commit range")]
    PriceOutOfRange(f64),
    #[error("requests out of order: {previous} then {next}")]
    OutOfOrder { previous: u64, next: u64 },
    #[error("pricing model failed: {0}")]
    Model(String),
}
