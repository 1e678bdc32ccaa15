//! # OLP Keeper
//!
//! Process wiring for the position request keeper.
//!
//! ## Description
//! - [`config`] - TOML configuration schema
//! - [`snapshot`] - file-backed market, Greeks, queue and journal collaborators
//! - [`supervisor`] - time-budgeted loop over the batch executor and trade collector
//! - [`solve`] - one-shot collateral to size and size to collateral quotes
//! - [`observability`] - tracing subscriber and Prometheus exporter
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

pub mod config;
pub mod observability;
pub mod snapshot;
pub mod solve;
pub mod supervisor;

pub use config::KeeperConfig;
pub use snapshot::{GreeksTier, JournalCommitter, LedgerSnapshot, SnapshotFile, SnapshotGreeks};
pub use solve::{CollateralArgs, CollateralReport, SolveArgs, SolveReport, SpreadArgs};
pub use supervisor::{Supervisor, SupervisorReport};
