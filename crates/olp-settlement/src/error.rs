//! Error types for batch execution and settlement.

use olp_options::PricingError;
use thiserror::Error;

/// Why the settlement ledger refused a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// Stale or duplicate submission; the batch is retried next cycle.
    #[error("ignorable commit failure: {0}")]
    Ignorable(String),

    #[error("commit failed: {0}")]
    Fatal(String),
}

const IGNORABLE_MESSAGES: [&str; 4] = [
    "nonce has already been used",
    "could not coalesce error",
    "nonce too low",
    "lower than the current nonce",
];

impl CommitError {
    /// Classifies a committer failure. Typed [`CommitError`]s pass through;
    /// anything else is matched on its message.
    pub fn classify(err: &anyhow::Error) -> Self {
        if let Some(typed) = err.downcast_ref::<CommitError>() {
            return typed.clone();
        }
        let message = format!("{err:#}");
        let lower = message.to_lowercase();
        if IGNORABLE_MESSAGES.iter().any(|needle| lower.contains(needle)) {
            Self::Ignorable(message)
        } else {
            Self::Fatal(message)
        }
    }

    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Ignorable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("price lane {index} out of range: {value}")]
    LaneOverflow { index: usize, value: u32 },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to load {what}: {message}")]
    Load { what: &'static str, message: String },

    #[error("pool greeks unavailable: {0}")]
    GreeksUnavailable(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Commit(CommitError),

    #[error("state store error: {0}")]
    Store(String),
}

impl BatchError {
    pub fn load(what: &'static str, err: &anyhow::Error) -> Self {
        Self::Load { what, message: format!("{err:#}") }
    }

    pub fn store(err: &anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }
}
