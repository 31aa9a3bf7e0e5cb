//! `sigil did`: Create, inspect and re-verify the caller's DID.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct DidArgs {
    #[command(subcommand)]
    pub command: DidCommand,
}

#[derive(Subcommand, Debug)]
pub enum DidCommand {
    /// Generate a DID for the signed-in user.
    Create {
        /// Service endpoint to publish in the document.
        #[arg(long)]
        service: Option<String>,

        /// Hex encoded Ed25519 public key to use instead of a server-generated one.
        #[arg(long)]
        public_key: Option<String>,
    },
    /// Show your DID with its anchoring history.
    Show,
    /// Re-run verification checks on your DID.
    Verify,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    include_service: bool,
    service_endpoint: Option<String>,
    public_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    did: String,
    public_key: String,
    private_key: Option<String>,
    status: String,
    job_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidDetails {
    did: DidRecord,
    operations: Vec<Value>,
    ipfs_pins: Vec<Value>,
    verifications: Vec<Value>,
}

#[derive(Deserialize)]
struct DidRecord {
    did_identifier: String,
    public_key: String,
    status: String,
    created_at: String,
    did_document: Value,
}

#[derive(Deserialize)]
struct VerificationRecord {
    status: String,
    verification_method: String,
    result: Option<Value>,
}

pub async fn run(client: &NodeClient, args: &DidArgs) -> anyhow::Result<()> {
    client.require_token()?;
    match &args.command {
        DidCommand::Create {
            service,
            public_key,
        } => create(client, service.clone(), public_key.clone()).await,
        DidCommand::Show => show(client).await,
        DidCommand::Verify => verify(client).await,
    }
}

async fn create(
    client: &NodeClient,
    service: Option<String>,
    public_key: Option<String>,
) -> anyhow::Result<()> {
    let body = GenerateRequest {
        include_service: service.is_some(),
        service_endpoint: service,
        public_key,
    };
    let data: GenerateResponse = client.post("/functions/generate-did", &body).await?;

    println!("DID created!");
    println!("  DID:        {}", data.did);
    println!("  Public key: {}", data.public_key);
    println!("  Status:     {}", data.status);
    println!("  Job:        {}", data.job_id);
    if let Some(private_key) = data.private_key {
        println!();
        println!("  Private key: {}", private_key);
        println!("  Store it safely, it will not be shown again.");
    }
    Ok(())
}

async fn show(client: &NodeClient) -> anyhow::Result<()> {
    let details: DidDetails = client.get("/api/v1/dids/me").await?;

    println!("DID:");
    println!("  Identifier: {}", details.did.did_identifier);
    println!("  Public key: {}", details.did.public_key);
    println!("  Status:     {}", details.did.status);
    println!("  Created:    {}", details.did.created_at);
    println!("  Operations: {}", details.operations.len());
    println!("  IPFS pins:  {}", details.ipfs_pins.len());
    println!("  Checks:     {}", details.verifications.len());
    println!();
    println!("{}", serde_json::to_string_pretty(&details.did.did_document)?);
    Ok(())
}

async fn verify(client: &NodeClient) -> anyhow::Result<()> {
    let record: VerificationRecord = client.post("/api/v1/dids/me/verify", &Value::Null).await?;

    println!("Verification ({}): {}", record.verification_method, record.status.to_uppercase());
    if let Some(Value::Object(checks)) = record.result {
        for (name, check) in &checks {
            let icon = if check["status"] == "passed" { "PASS" } else { "FAIL" };
            match check["message"].as_str() {
                Some(message) if !message.is_empty() => {
                    println!("  [{}] {}: {}", icon, name, message)
                }
                _ => println!("  [{}] {}", icon, name),
            }
        }
    }
    Ok(())
}
