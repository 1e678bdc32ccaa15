//! # Keeper Supervisor
//!
//! Time-budgeted scheduling of the batch executor and the trade collector.
//!
//! ## Description
//! Both loops run concurrently and share no mutable state. Each loop runs a
//! batch, pauses for `interval_ms` (capped at the time left) and repeats
//! until `max_runtime_secs` has elapsed. A batch that has started always
//! runs to completion; the deadline only stops new batches from starting.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::config::KeeperConfig;
use crate::snapshot::{GreeksTier, JournalCommitter, SnapshotFile, SnapshotGreeks};
use olp_options::PricingModel;
use olp_settlement::{
    BatchExecutor, BatchOutcome, BatchSinks, BatchSources, GreeksFallbackChain, GreeksSource, HistoricalPriceSource,
    JsonFileStore, JsonlAuditSink, LogNotifier, OperatorNotifier, TradeStats, TradeStatsCollector,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub max_items: usize,
    pub collector_max_items: usize,
    pub interval: Duration,
    pub max_runtime: Duration,
    pub once: bool,
}

impl Schedule {
    pub fn from_config(config: &KeeperConfig, once: bool) -> Self {
        Self {
            max_items: config.batch.max_items,
            collector_max_items: config.collector.max_items,
            interval: Duration::from_millis(config.batch.interval_ms),
            max_runtime: Duration::from_secs(config.batch.max_runtime_secs),
            once: once || config.batch.once,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupervisorReport {
    pub batches: usize,
    pub committed: usize,
    pub batch_errors: usize,
    pub collector_runs: usize,
    pub trades_recorded: usize,
    pub collector_errors: usize,
}

pub struct Supervisor {
    executor: BatchExecutor,
    collector: Option<TradeStatsCollector>,
    schedule: Schedule,
}

impl Supervisor {
    pub fn new(executor: BatchExecutor, collector: Option<TradeStatsCollector>, schedule: Schedule) -> Self {
        Self { executor, collector, schedule }
    }

    /// Wires the snapshot file, journal and file stores named in `config`.
    pub fn from_config(config: &KeeperConfig, once: bool) -> Self {
        let sources = &config.sources;
        let snapshot = Arc::new(SnapshotFile::new(&sources.snapshot));
        let notifier: Arc<dyn OperatorNotifier> = Arc::new(LogNotifier);

        let greeks = GreeksFallbackChain::new(vec![
            Arc::new(SnapshotGreeks::new((*snapshot).clone(), GreeksTier::Primary)) as Arc<dyn GreeksSource>,
            Arc::new(SnapshotGreeks::new((*snapshot).clone(), GreeksTier::Secondary)),
        ]);
        let model: Arc<dyn PricingModel> = Arc::new(config.model());
        let executor = BatchExecutor::new(
            model,
            BatchSources { market: snapshot.clone(), greeks, queue: snapshot.clone() },
            BatchSinks {
                committer: Arc::new(JournalCommitter::new(&sources.commit_journal)),
                audit: Arc::new(JsonlAuditSink::new(&sources.audit_log)),
                notifier: notifier.clone(),
                cursor: Arc::new(JsonFileStore::<u64>::new(&sources.cursor)),
            },
        )
        .with_registry(config.registry())
        .with_quantizer(config.quantizer());

        let collector = config.collector.enabled.then(|| {
            TradeStatsCollector::new(
                snapshot.clone(),
                vec![snapshot.clone() as Arc<dyn HistoricalPriceSource>],
                Arc::new(JsonFileStore::<TradeStats>::new(&sources.trade_stats)),
                notifier.clone(),
            )
        });

        Self::new(executor, collector, Schedule::from_config(config, once))
    }

    pub async fn run(&self) -> SupervisorReport {
        let deadline = Instant::now() + self.schedule.max_runtime;
        info!(
            "[KEEPER] supervisor started run_id={} budget={:?} once={}",
            self.executor.run_id(),
            self.schedule.max_runtime,
            self.schedule.once
        );

        let (batches, collected) = tokio::join!(self.executor_loop(deadline), self.collector_loop(deadline));
        let report = SupervisorReport {
            batches: batches.0,
            committed: batches.1,
            batch_errors: batches.2,
            collector_runs: collected.0,
            trades_recorded: collected.1,
            collector_errors: collected.2,
        };
        info!("[KEEPER] supervisor finished {:?}", report);
        report
    }

    /// Returns (batches, committed, errors).
    async fn executor_loop(&self, deadline: Instant) -> (usize, usize, usize) {
        let (mut batches, mut committed, mut errors) = (0, 0, 0);
        while Instant::now() < deadline {
            batches += 1;
            match self.executor.run_batch(self.schedule.max_items).await {
                Ok(BatchOutcome::Committed(summary)) => {
                    committed += 1;
                    info!("[KEEPER] committed {} requests, cursor {}", summary.priced, summary.cursor);
                }
                Ok(outcome) => info!("[KEEPER] batch {}", outcome.label()),
                Err(e) => {
                    errors += 1;
                    warn!("[KEEPER] batch failed: {}", e);
                }
            }
            if self.schedule.once || !pause(self.schedule.interval, deadline).await {
                break;
            }
        }
        (batches, committed, errors)
    }

    /// Returns (runs, recorded, errors).
    async fn collector_loop(&self, deadline: Instant) -> (usize, usize, usize) {
        let Some(collector) = &self.collector else {
            return (0, 0, 0);
        };
        let (mut runs, mut recorded, mut errors) = (0, 0, 0);
        while Instant::now() < deadline {
            runs += 1;
            match collector.run_batch(self.schedule.collector_max_items).await {
                Ok(outcome) => {
                    recorded += outcome.recorded;
                    metrics::counter!("olp_trades_collected_total").increment(outcome.recorded as u64);
                    if let Some(stop) = outcome.stopped {
                        info!("[KEEPER] collector stopped: {:?}", stop);
                    }
                }
                Err(e) => {
                    errors += 1;
                    warn!("[KEEPER] collector failed: {}", e);
                }
            }
            if self.schedule.once || !pause(self.schedule.interval, deadline).await {
                break;
            }
        }
        (runs, recorded, errors)
    }
}

/// Sleeps for `interval`, capped at the time left. False once the deadline has passed.
async fn pause(interval: Duration, deadline: Instant) -> bool {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return false;
    }
    tokio::time::sleep(interval.min(remaining)).await;
    Instant::now() < deadline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_capped_at_deadline() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(300);
        assert!(pause(Duration::from_millis(100), deadline).await);
        assert!(!pause(Duration::from_secs(10), deadline).await);
        assert_eq!(Instant::now() - start, Duration::from_millis(300));
        assert!(!pause(Duration::from_millis(100), deadline).await);
    }

    #[test]
    fn test_once_flag_merges_with_config() {
        let mut config = KeeperConfig::default();
        assert!(!Schedule::from_config(&config, false).once);
        assert!(Schedule::from_config(&config, true).once);
        config.batch.once = true;
        assert!(Schedule::from_config(&config, false).once);
    }
}
