//! # Collateral Quote
//!
//! One-shot spread quotes against a ledger snapshot.
//!
//! ## Description
//! Builds the pool state from the snapshot's Greeks and utility ratios, then
//! asks [`InverseSizeSolver`] either for the spread size whose collateral
//! plus fee matches a requested amount (`solve`) or for the collateral a
//! given size needs (`collateral`). The pool state is only read.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::config::KeeperConfig;
use crate::snapshot::LedgerSnapshot;
use clap::Args;
use olp_models::{PoolRiskState, UnderlyingAsset};
use olp_options::{CollateralQuery, InverseSizeSolver};
use serde::Serialize;
use tracing::info;

/// Spread to quote.
#[derive(Args, Debug, Clone)]
pub struct SpreadArgs {
    /// Underlying ticker (BTC or ETH)
    #[arg(long, default_value = "BTC")]
    pub asset: UnderlyingAsset,

    /// Expiry, unix seconds
    #[arg(long)]
    pub expiry: i64,

    /// Main and paired strike, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = vec![60_000u64, 70_000])]
    pub strikes: Vec<u64>,

    /// Quote a call spread instead of a put spread
    #[arg(long, default_value = "false")]
    pub call: bool,

    /// Quote the buy side
    #[arg(long, default_value = "false")]
    pub buy: bool,
}

impl SpreadArgs {
    pub fn query(&self, target_collateral: f64) -> anyhow::Result<CollateralQuery> {
        let strikes: [u64; 2] = self
            .strikes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected two strikes, got {}", self.strikes.len()))?;
        Ok(CollateralQuery {
            underlying: self.asset,
            expiry: self.expiry,
            strikes,
            is_call: self.call,
            is_buy: self.buy,
            target_collateral,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    #[command(flatten)]
    pub spread: SpreadArgs,

    /// Target collateral in USDC
    #[arg(long)]
    pub collateral: f64,
}

#[derive(Args, Debug, Clone)]
pub struct CollateralArgs {
    #[command(flatten)]
    pub spread: SpreadArgs,

    /// Spread size in contracts
    #[arg(long)]
    pub size: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub query: CollateralQuery,
    pub size: f64,
    pub converged: bool,
    pub iterations: u32,
    pub best_diff: f64,
}

pub fn run(config: &KeeperConfig, snapshot: &LedgerSnapshot, args: &SolveArgs) -> anyhow::Result<SolveReport> {
    let query = args.spread.query(args.collateral)?;
    let state = PoolRiskState::new(snapshot.greeks(), snapshot.utility_ratios.clone());
    let model = config.model();
    let solver = InverseSizeSolver::new(config.solver);

    let outcome = solver.solve_size_for_collateral(
        &model,
        &snapshot.market,
        &state,
        &query,
        config.quantizer().default_risk_premium_value(),
    );
    info!(
        "[SOLVE] {} {:?} collateral={} size={:.8} converged={}",
        query.underlying, query.strikes, query.target_collateral, outcome.size, outcome.converged
    );

    Ok(SolveReport {
        query,
        size: outcome.size,
        converged: outcome.converged,
        iterations: outcome.iterations,
        best_diff: outcome.best_diff,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralReport {
    /// The quoted spread; `target_collateral` carries the answer.
    pub query: CollateralQuery,
    pub size: f64,
    pub collateral: f64,
}

pub fn collateral(
    config: &KeeperConfig,
    snapshot: &LedgerSnapshot,
    args: &CollateralArgs,
) -> anyhow::Result<CollateralReport> {
    if !(args.size.is_finite() && args.size > 0.0) {
        anyhow::bail!("size must be positive, got {}", args.size);
    }
    let query = args.spread.query(0.0)?;
    let state = PoolRiskState::new(snapshot.greeks(), snapshot.utility_ratios.clone());
    let model = config.model();

    let collateral = InverseSizeSolver::new(config.solver)
        .collateral_for_size(
            &model,
            &snapshot.market,
            &state,
            &query,
            args.size,
            config.quantizer().default_risk_premium_value(),
        )
        .ok_or_else(|| anyhow::anyhow!("cannot price {} {:?} at {}", query.underlying, query.strikes, query.expiry))?;
    info!("[SOLVE] {} {:?} size={} collateral={:.6}", query.underlying, query.strikes, args.size, collateral);

    Ok(CollateralReport {
        query: CollateralQuery { target_collateral: collateral, ..query },
        size: args.size,
        collateral,
    })
}
