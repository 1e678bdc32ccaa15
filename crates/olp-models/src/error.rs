//! Errors raised while interpreting raw model values.

use thiserror::Error;

/// Failure to map a raw ledger or snapshot value onto a model type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown underlying asset index {0}")]
    UnknownUnderlyingIndex(u16),
    #[error("unknown underlying asset '{0}'")]
    UnknownUnderlying(String),
    #[error("unknown quote asset '{0}'")]
    UnknownQuoteAsset(String),
    #[error("vault index {0} does not map to a tranche")]
    UnknownVaultIndex(u8),
    #[error("unknown tranche key '{0}'")]
    UnknownTranche(String),
    #[error("strategy index {0} is not supported")]
    UnsupportedStrategy(u8),
    #[error("unknown request status code {0}")]
    UnknownStatus(u8),
    #[error("missing spot index for {0}")]
    MissingSpot(String),
    #[error("missing futures index for {0}")]
    MissingFutures(String),
    #[error("invalid instrument id '{0}'")]
    InvalidInstrumentId(String),
}
