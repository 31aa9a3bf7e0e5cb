//! `sigil apply`: Apply to become a credential issuer.

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Organization or full name.
    #[arg(short, long)]
    pub name: String,

    /// Contact email.
    #[arg(long)]
    pub email: String,

    /// Organization website.
    #[arg(short, long)]
    pub website: Option<String>,

    /// The organization's DNS record has been verified.
    #[arg(long)]
    pub dns_verified: bool,

    /// The contact email has been verified.
    #[arg(long)]
    pub email_verified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationRequest<'a> {
    full_name: &'a str,
    email: &'a str,
    website_url: Option<&'a str>,
    dns_verification: bool,
    email_verification: bool,
}

#[derive(Deserialize)]
struct IssuerApplication {
    id: String,
    full_name: String,
    status: String,
    created_at: String,
}

pub async fn run(client: &NodeClient, args: &ApplyArgs) -> anyhow::Result<()> {
    client.require_token()?;
    let body = ApplicationRequest {
        full_name: &args.name,
        email: &args.email,
        website_url: args.website.as_deref(),
        dns_verification: args.dns_verified,
        email_verification: args.email_verified,
    };
    let application: IssuerApplication = client.post("/api/v1/applications/me", &body).await?;

    println!("Application submitted!");
    println!("  ID:        {}", application.id);
    println!("  Name:      {}", application.full_name);
    println!("  Status:    {}", application.status);
    println!("  Submitted: {}", application.created_at);
    Ok(())
}
