//! # Keeper Observability
//!
//! Structured logging and the Prometheus exporter.
//!
//! ## Description
//! - **Logging**: `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
//! - **Metrics**: Prometheus HTTP exporter serving the `olp_*` counters and
//!   histograms recorded by the settlement crate.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions
//! - Prometheus Monitoring Guide

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
///
/// # Parameters
/// * `addr` - The network address to bind the HTTP metrics endpoint to.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus recorder")?;
    tracing::info!("Prometheus metrics exporter started on {}", addr);
    Ok(())
}

/// Installs the global fmt subscriber. Safe to call more than once.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok();
    if installed {
        tracing::info!("tracing initialized for service: {}", service_name);
    }
}
