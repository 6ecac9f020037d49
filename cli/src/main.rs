use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use chainstore_kernel::config::{NodeConfig, StoreConfig};
use chainstore_kernel::replay::{replay_operations, Operation, ReplayReport};

/// Chainstore CLI
#[derive(Parser, Debug)]
#[command(name = "chainstore")]
#[command(about = "Replay chain operations against an in-memory server store", long_about = None)]
struct Cli {
    /// Path to node config JSON (cluster connection + store settings)
    #[arg(long)]
    config: Option<String>,

    /// Path to operation script JSON
    #[arg(long)]
    ops: String,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    cluster_uri: Option<String>,
    store: StoreConfig,
    report: ReplayReport,
}

fn main() -> Result<()> {
    env_logger::init_from_env("CHAINSTORE_LOG");
    let cli = Cli::parse();

    // ----------------------------
    // Load node config
    // ----------------------------
    let (cluster_uri, store_config) = match &cli.config {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading config {path}"))?;
            let config: NodeConfig = serde_json::from_str(&data)
                .with_context(|| format!("parsing config {path}"))?;
            info!(
                "cluster {} (auto create: {})",
                config.cluster.cluster_uri(),
                config.cluster.is_auto_create()
            );
            (Some(config.cluster.cluster_uri().to_owned()), config.store)
        }
        None => (None, StoreConfig::default()),
    };

    // ----------------------------
    // Load operation script
    // ----------------------------
    let ops_data =
        fs::read_to_string(&cli.ops).with_context(|| format!("reading ops {}", cli.ops))?;
    let ops: Vec<Operation> = serde_json::from_str(&ops_data)?;

    // ----------------------------
    // Replay
    // ----------------------------
    let store = store_config.open()?;
    info!("replaying {} operations on store {}", ops.len(), store.id().0);
    let report = replay_operations(store.as_ref(), &ops)?;

    // ----------------------------
    // Output
    // ----------------------------
    let output = CliOutput {
        cluster_uri,
        store: store_config,
        report,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
