//! `sigil status`: Query the status of a running Sigil node.

use clap::Args;
use serde::Deserialize;

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct GlobalStats {
    total: usize,
    anchored: usize,
    pending: usize,
    failed: usize,
}

#[derive(Deserialize)]
struct Profile {
    id: String,
    email: Option<String>,
    role: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserStats {
    total_dids: usize,
    verified_dids: usize,
    ipfs_pins: usize,
    pending_operations: usize,
}

pub async fn run(client: &NodeClient, _args: &StatusArgs) -> anyhow::Result<()> {
    let health: HealthResponse = match client.get_raw("/api/v1/health").await {
        Ok(health) => health,
        Err(e) => {
            println!("Could not reach node at {}", client.endpoint());
            println!("  Error: {:#}", e);
            println!();
            println!("Is the node running? Start it with: sigil-node");
            return Ok(());
        }
    };
    let stats: GlobalStats = client.get("/api/v1/stats/global").await?;

    println!("Node Status:");
    println!("  Health:     {}", health.status);
    println!("  Version:    {}", health.version);
    println!("  Uptime:     {}s", health.uptime_secs);
    println!(
        "  DIDs:       {} total, {} anchored, {} pending, {} failed",
        stats.total, stats.anchored, stats.pending, stats.failed
    );

    if client.require_token().is_ok() {
        let profile: Profile = client.get("/api/v1/profile").await?;
        let mine: UserStats = client.get("/api/v1/stats/me").await?;
        println!();
        println!("Signed in as {} ({})", profile.email.as_deref().unwrap_or(&profile.id), profile.role);
        println!("  DIDs:       {} ({} verified)", mine.total_dids, mine.verified_dids);
        println!("  IPFS pins:  {}", mine.ipfs_pins);
        println!("  Pending:    {}", mine.pending_operations);
    }
    Ok(())
}
