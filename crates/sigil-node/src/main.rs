//! Sigil Node: entry point.
//!
//! Starts the Sigil node with configuration from a TOML file or defaults.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sigil_crypto::MasterKey;
use sigil_node::{SigilConfig, SigilNode};

/// Sigil Node
#[derive(Parser, Debug)]
#[command(name = "sigil-node", version, about = "Sigil DID issuance and anchoring node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "sigil.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file with a fresh master key and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if args.init {
        SigilConfig::default()
    } else {
        SigilConfig::load(&args.config)?
    };
    if let Some(level) = args.log_level.clone() {
        config.logging.level = level;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    if args.init {
        config.identity.master_key = Some(MasterKey::generate().to_hex().to_string());
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    tracing::info!("Sigil Node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = SigilNode::new(config)?;
    let addr = node.start().await?;
    tracing::info!(%addr, "API listening");

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
    }

    node.shutdown().await?;
    tracing::info!("Sigil node exited cleanly");
    Ok(())
}
