use std::path::PathBuf;

use clap::Parser;
use corosuke_runtime::config::{NodeConfig, NodeKind};
use tracing_subscriber::EnvFilter;

/// Control loop for one board of the robot
#[derive(Debug, Parser)]
#[command(name = "corosuke-runtime", version)]
struct Cli {
    /// Board to run; required unless a config file names it
    #[arg(long, value_enum, required_unless_present = "config")]
    node: Option<NodeKind>,

    /// Serial port toward the main board
    #[arg(long)]
    upstream: Option<String>,

    /// Serial port toward the next board down
    #[arg(long)]
    downstream: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Seed for blink and idle randomness
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without the zenoh bridge
    #[arg(long)]
    no_zenoh: bool,
}

impl Cli {
    fn into_config(self) -> Result<NodeConfig, corosuke_runtime::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };

        if let Some(node) = self.node {
            config.node = node;
        }
        if self.upstream.is_some() {
            config.upstream_port = self.upstream;
        }
        if self.downstream.is_some() {
            config.downstream_port = self.downstream;
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.no_zenoh {
            config.zenoh = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = corosuke_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
