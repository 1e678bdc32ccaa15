//! # OLP Settlement
//!
//! Runs priced batches against the settlement ledger.
//!
//! ## Description
//! - [`loaders`] - market, pool Greeks (fallback chain) and request queue seams
//! - [`executor`] - [`BatchExecutor::run_batch`], one load/price/commit cycle
//! - [`commit`] - commit payload, price packing, committer seam
//! - [`audit`] - audit rows and sinks
//! - [`collector`] - [`TradeStatsCollector`], the trade statistics runner
//! - [`store`] - cursor and statistics persistence
//! - [`notify`] - operator escalation
//! - [`memory`] - in-memory ledger and fixed-snapshot collaborators
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

pub mod audit;
pub mod collector;
pub mod commit;
pub mod error;
pub mod executor;
pub mod loaders;
pub mod memory;
pub mod notify;
pub mod store;

pub use audit::{AuditRow, AuditRows, AuditSink, JsonlAuditSink, TracingAuditSink};
pub use collector::{
    CollectOutcome, CollectStop, HistoricalPriceSource, SettledTrade, TradeStats, TradeStatsCollector,
};
pub use commit::{pack_prices, unpack_prices, CommitPayload, CommitReceipt, PriceWord, SettlementCommitter};
pub use error::{BatchError, CommitError, PackError};
pub use executor::{BatchExecutor, BatchOutcome, BatchSinks, BatchSources, CommitSummary};
pub use loaders::{
    GreeksFallbackChain, GreeksSource, MarketContextLoader, PendingBatch, RequestQueue, TrancheGreeks,
};
pub use memory::{InMemoryLedger, MemoryAuditSink, RecordingNotifier, StaticGreeks, StaticMarket};
pub use notify::{LogNotifier, OperatorNotifier};
pub use store::{JsonFileStore, MemoryStore, StateStore};
