//! # OLP Models
//!
//! Shared data model for the option liquidity pool keeper.
//!
//! ## Description
//! Plain, serializable types consumed by every other crate in the workspace:
//! - **Assets**: underlying assets, quote assets and the address registry
//! - **Tranches**: the three OLP partitions (short/mid/long term)
//! - **Greeks**: aggregate option sensitivities held by a tranche
//! - **Requests**: position requests read from the ledger queue
//! - **Market**: the immutable per-batch market snapshot
//! - **Pool**: mutable per-batch pool risk state
//!
//! Nothing in this crate performs I/O.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

pub mod amount;
pub mod asset;
pub mod error;
pub mod greeks;
pub mod instrument;
pub mod market;
pub mod pool;
pub mod request;
pub mod strategy;
pub mod tranche;

pub use asset::{AssetRegistry, QuoteAsset, UnderlyingAsset};
pub use error::ModelError;
pub use greeks::Greeks;
pub use instrument::InstrumentId;
pub use market::{InstrumentMark, MarketContext, RatePoint};
pub use pool::{PoolRiskState, UtilityRatio, UtilityRatios};
pub use request::{PositionRequest, RequestStatus};
pub use strategy::Strategy;
pub use tranche::Tranche;
