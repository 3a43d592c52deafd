//! Node Balancer
//!
//! A reverse proxy that picks one healthy RPC node per request and forwards to it.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                    NODE BALANCER                      │
//!                              │                                                       │
//!     Client Request           │  ┌──────────┐    ┌──────────┐    ┌──────────────┐    │
//!     ─────────────────────────┼─▶│ pre-     │───▶│ handler  │───▶│ selection    │    │
//!                              │  │ checks   │    │          │    │ cache        │    │
//!                              │  └──────────┘    └──────────┘    └──────┬───────┘    │
//!                              │                                    miss │            │
//!                              │                                         ▼            │
//!                              │                                 ┌──────────────┐     │   probes
//!                              │                                 │ prober+racer │─────┼──────────▶ Nodes
//!                              │                                 │ + strategy   │     │
//!                              │                                 └──────┬───────┘     │
//!                              │                                         ▼            │
//!     Client Response          │  ┌──────────┐    ┌──────────┐    ┌──────────────┐    │  forward
//!     ◀────────────────────────┼──│ headers  │◀───│ stats    │◀───│ forwarder    │────┼──────────▶ Node
//!                              │  │ + enrich │    │          │    │ (retries)    │    │
//!                              │  └──────────┘    └──────────┘    └──────────────┘    │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use node_balancer::config::loader::load_config;
use node_balancer::lifecycle::{wait_for_signal, Shutdown};
use node_balancer::net::tls::{load_tls_config, tls_files_present};
use node_balancer::observability::{logging, metrics};
use node_balancer::HttpServer;

#[derive(Parser)]
#[command(name = "node-balancer")]
#[command(about = "Reverse proxy balancing requests over RPC nodes", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        version = %config.version,
        bind_address = %config.listener.bind_address,
        nodes = ?config.nodes,
        strategy = %config.probe.strategy,
        min_blockchain_version = %config.probe.min_blockchain_version,
        max_jussi_number_diff = config.probe.max_jussi_number_diff,
        timeout_ms = config.probe.timeout_ms,
        retry_count = config.forward.retry_count,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tls = match &config.listener.tls {
        Some(tls) if tls_files_present(tls) => Some(load_tls_config(tls).await?),
        Some(tls) => {
            tracing::warn!(
                cert_path = %tls.cert_path,
                key_path = %tls.key_path,
                "TLS files not found, serving plain HTTP"
            );
            None
        }
        None => {
            tracing::warn!("No TLS configured, serving plain HTTP");
            None
        }
    };

    let bind_address = config.listener.bind_address.clone();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;

    let mut server_task = match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            tokio::spawn(server.run_tls(addr, tls, shutdown.subscribe()))
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tokio::spawn(server.run(listener, shutdown.subscribe()))
        }
    };

    let reason = tokio::select! {
        reason = wait_for_signal() => reason,
        finished = &mut server_task => {
            finished??;
            tracing::warn!("Server stopped without a shutdown signal");
            return Ok(ExitCode::FAILURE);
        }
    };

    tracing::info!(signal = %reason, "Shutting down");
    shutdown.trigger();
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Server error during shutdown"),
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(ExitCode::from(reason.exit_code()))
}
