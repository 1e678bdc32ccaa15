//! # OLP Keeper
//!
//! Entry point for the position request keeper.
//!
//! ## Description
//! - `run`: supervises the batch executor and the trade statistics collector
//!   against the configured ledger snapshot until the runtime budget is spent.
//! - `solve`: prints the spread size whose collateral matches a target amount.
//! - `collateral`: prints the collateral a given spread size needs.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use anyhow::Context;
use clap::{Parser, Subcommand};
use olp_keeper::observability::{init_metrics, init_tracing};
use olp_keeper::snapshot::SnapshotFile;
use olp_keeper::{solve, CollateralArgs, KeeperConfig, SolveArgs, Supervisor};
use std::net::SocketAddr;
use tracing::info;

/// Position Request Keeper Command Line Interface
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file path
    #[arg(long, default_value = "configs/keeper.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Price and commit pending requests until the runtime budget is spent
    Run {
        /// Run a single batch of each loop and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },
    /// Quote the size of a spread for a target collateral
    Solve(SolveArgs),
    /// Quote the collateral needed for a spread size
    Collateral(CollateralArgs),
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenv::dotenv().ok();
    init_tracing("olp-keeper");

    let config = KeeperConfig::load(&args.config)?;
    info!("[KEEPER] loaded config {}", args.config);

    match args.command {
        Command::Run { once } => {
            if config.metrics.enabled {
                let metrics_port = std::env::var("METRICS_PORT").unwrap_or_else(|_| "9000".to_string());
                let metrics_addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
                    .parse()
                    .with_context(|| format!("invalid METRICS_PORT {}", metrics_port))?;
                init_metrics(metrics_addr)?;
            }

            let report = Supervisor::from_config(&config, once).run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Solve(solve_args) => {
            let snapshot = SnapshotFile::new(&config.sources.snapshot).load().await?;
            let report = solve::run(&config, &snapshot, &solve_args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Collateral(collateral_args) => {
            let snapshot = SnapshotFile::new(&config.sources.snapshot).load().await?;
            let report = solve::collateral(&config, &snapshot, &collateral_args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
