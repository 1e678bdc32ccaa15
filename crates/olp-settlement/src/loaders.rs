//! # Batch Inputs
//!
//! Loader seams for the market snapshot, pool Greeks and the request queue.
//!
//! ## Description
//! All three are external collaborators reached through `async_trait`
//! traits returning `anyhow::Result`. Pool Greeks are served by an ordered
//! [`GreeksFallbackChain`]: sources are tried in order, the first success
//! wins, and only when every source fails does the batch abort.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::BatchError;
use async_trait::async_trait;
use olp_models::{Greeks, MarketContext, PositionRequest, Tranche, UnderlyingAsset, UtilityRatios};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Greeks of every tranche, per underlying.
pub type TrancheGreeks = BTreeMap<Tranche, BTreeMap<UnderlyingAsset, Greeks>>;

#[async_trait]
pub trait MarketContextLoader: Send + Sync {
    async fn load_market_context(&self) -> anyhow::Result<MarketContext>;
}

#[async_trait]
pub trait GreeksSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load_greeks(&self) -> anyhow::Result<TrancheGreeks>;
}

/// Requests read from the ledger queue starting at a cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    /// At most `max_items` requests, ascending by index.
    pub requests: Vec<PositionRequest>,
    pub utility_ratios: UtilityRatios,
    /// Index the ledger will assign to its next request.
    pub end_index: u64,
}

#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Loads up to `max_items` requests with index `>= cursor`.
    async fn load_pending(&self, cursor: u64, max_items: usize) -> anyhow::Result<PendingBatch>;
}

#[derive(Clone, Default)]
pub struct GreeksFallbackChain {
    sources: Vec<Arc<dyn GreeksSource>>,
}

impl GreeksFallbackChain {
    pub fn new(sources: Vec<Arc<dyn GreeksSource>>) -> Self {
        Self { sources }
    }

    pub fn with_source(mut self, source: Arc<dyn GreeksSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads Greeks from the first source that answers.
    ///
    /// # Returns
    /// The Greeks and the name of the source that served them, or
    /// [`BatchError::GreeksUnavailable`] listing every failure.
    pub async fn load(&self) -> Result<(TrancheGreeks, String), BatchError> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.load_greeks().await {
                Ok(greeks) => {
                    debug!("[BATCH] Pool greeks served by {}", source.name());
                    return Ok((greeks, source.name().to_string()));
                }
                Err(err) => {
                    warn!("[BATCH] Greeks source {} failed: {:#}", source.name(), err);
                    metrics::counter!("olp_greeks_fallback_total", "source" => source.name().to_string())
                        .increment(1);
                    failures.push(format!("{}: {:#}", source.name(), err));
                }
            }
        }
        if failures.is_empty() {
            failures.push("no sources configured".to_string());
        }
        Err(BatchError::GreeksUnavailable(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Source {
        name: &'static str,
        delta: Option<f64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GreeksSource for Source {
        fn name(&self) -> &str {
            self.name
        }

        async fn load_greeks(&self) -> anyhow::Result<TrancheGreeks> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delta = self.delta.ok_or_else(|| anyhow::anyhow!("{} offline", self.name))?;
            let mut greeks = TrancheGreeks::new();
            greeks
                .entry(Tranche::Short)
                .or_default()
                .insert(UnderlyingAsset::Btc, Greeks::new(delta, 0.0, 0.0, 0.0));
            Ok(greeks)
        }
    }

    fn source(name: &'static str, delta: Option<f64>) -> Arc<Source> {
        Arc::new(Source { name, delta, calls: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let primary = source("primary", Some(1.0));
        let secondary = source("secondary", Some(2.0));
        let chain = GreeksFallbackChain::new(vec![primary.clone() as Arc<dyn GreeksSource>, secondary.clone()]);
        let (greeks, served_by) = chain.load().await.unwrap();
        assert_eq!(served_by, "primary");
        assert_eq!(greeks[&Tranche::Short][&UnderlyingAsset::Btc].delta, 1.0);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_then_fails() {
        let chain = GreeksFallbackChain::default()
            .with_source(source("primary", None))
            .with_source(source("secondary", Some(2.0)));
        let (_, served_by) = chain.load().await.unwrap();
        assert_eq!(served_by, "secondary");

        let chain = GreeksFallbackChain::default()
            .with_source(source("primary", None))
            .with_source(source("secondary", None));
        match chain.load().await {
            Err(BatchError::GreeksUnavailable(message)) => {
                assert!(message.contains("primary offline"));
                assert!(message.contains("secondary offline"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
