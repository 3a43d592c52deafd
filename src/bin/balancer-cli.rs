use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use node_balancer::config::loader::load_config;
use node_balancer::health::{NodeProber, SharedStaleness};
use node_balancer::load_balancer::{NodePool, Strategy};
use node_balancer::observability::stats::StatsAggregator;
use node_balancer::resilience::build_client;

#[derive(Parser)]
#[command(name = "balancer-cli")]
#[command(about = "Operator CLI for the node balancer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the live stats of a running balancer
    Stats {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Probe every configured node once and show the strategy's pick
    Probe {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { url } => {
            let res = reqwest::get(&url).await?;
            let status = res.status();
            let body: Value = res.json().await?;
            if !status.is_success() {
                eprintln!("Error: balancer returned status {}", status);
            }
            match body.get("__stats__") {
                Some(stats) => println!("{}", serde_json::to_string_pretty(stats)?),
                None => println!("{}", serde_json::to_string_pretty(&body)?),
            }
        }
        Commands::Probe { config } => {
            let config = load_config(&config)?;
            let strategy = Strategy::from_str(&config.probe.strategy)?;
            let pool = NodePool::new(config.nodes.clone());
            let prober = NodeProber::new(
                build_client(&config.probe)?,
                config.probe.clone(),
                Arc::new(SharedStaleness::new()),
                Arc::new(StatsAggregator::new(&config.rate_limit)),
            );

            let mut healthy = Vec::new();
            for node in pool.nodes() {
                match prober.probe(node).await {
                    Ok(record) => {
                        println!(
                            "OK    {} version={} jussi_number={} latency={:?}",
                            record.server, record.blockchain_version, record.freshness, record.latency
                        );
                        healthy.push(record);
                    }
                    Err(e) => println!("FAIL  {} {}", node, e),
                }
            }

            healthy.sort_by_key(|r| r.latency);
            match strategy.select(&healthy) {
                Some(chosen) => println!("\n{} picks {}", strategy, chosen.server),
                None => println!("\nno valid node found"),
            }
        }
    }

    Ok(())
}
