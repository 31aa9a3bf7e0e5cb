//! `sigil credentials`: List the caller's credentials.

use clap::{Args, Subcommand};
use serde::Deserialize;
use serde_json::Value;

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// List active credentials; the index is what `sigil present --select` takes.
    List,
}

#[derive(Deserialize)]
struct StoredCredential {
    credential_id: String,
    credential_type: String,
    credential_data: Value,
    status: String,
    issued_at: String,
    expires_at: Option<String>,
}

pub async fn run(client: &NodeClient, args: &CredentialsArgs) -> anyhow::Result<()> {
    client.require_token()?;
    match args.command {
        CredentialsCommand::List => list(client).await,
    }
}

async fn list(client: &NodeClient) -> anyhow::Result<()> {
    let credentials: Vec<StoredCredential> = client.get("/api/v1/credentials").await?;
    if credentials.is_empty() {
        println!("No credentials.");
        return Ok(());
    }

    println!("Credentials ({}):", credentials.len());
    for (index, credential) in credentials.iter().enumerate() {
        let issuer = credential.credential_data["issuer"]["name"]
            .as_str()
            .unwrap_or("Unknown Issuer");
        println!("  [{}] {} from {}", index, credential.credential_type, issuer);
        println!("      ID:      {}", credential.credential_id);
        println!("      Status:  {}", credential.status);
        println!("      Issued:  {}", credential.issued_at);
        if let Some(ref expires) = credential.expires_at {
            println!("      Expires: {}", expires);
        }
    }
    Ok(())
}
