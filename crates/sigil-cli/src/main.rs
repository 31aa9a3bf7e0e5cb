//! Sigil CLI: command-line client for a running Sigil node.
//!
//! Subcommands: did, credentials, present, verify, anchor, apply, status.

mod client;
mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use client::NodeClient;

/// Sigil: DID issuance and verifiable presentations.
#[derive(Parser, Debug)]
#[command(name = "sigil", version, about, long_about = None)]
struct Cli {
    /// API endpoint of the node.
    #[arg(
        short,
        long,
        global = true,
        env = "SIGIL_ENDPOINT",
        default_value = "http://127.0.0.1:9101"
    )]
    endpoint: String,

    /// Bearer token of the signed-in user.
    #[arg(short, long, global = true, env = "SIGIL_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, show or re-verify your DID.
    Did(commands::did::DidArgs),
    /// List your active credentials.
    Credentials(commands::credentials::CredentialsArgs),
    /// Build a verifiable presentation from selected credentials.
    Present(commands::present::PresentArgs),
    /// Verify a presentation.
    Verify(commands::verify::VerifyArgs),
    /// Submit an anchoring operation to the ledger.
    Anchor(commands::anchor::AnchorArgs),
    /// Apply to become a credential issuer.
    Apply(commands::apply::ApplyArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = NodeClient::new(&cli.endpoint, cli.token.clone());

    match &cli.command {
        Commands::Did(args) => commands::did::run(&client, args).await,
        Commands::Credentials(args) => commands::credentials::run(&client, args).await,
        Commands::Present(args) => commands::present::run(&client, args).await,
        Commands::Verify(args) => commands::verify::run(&client, args).await,
        Commands::Anchor(args) => commands::anchor::run(&client, args).await,
        Commands::Apply(args) => commands::apply::run(&client, args).await,
        Commands::Status(args) => commands::status::run(&client, args).await,
    }
}
