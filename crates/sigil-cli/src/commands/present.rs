//! `sigil present`: Build a verifiable presentation.

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crate::client::NodeClient;

const QR_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";

#[derive(Args, Debug)]
pub struct PresentArgs {
    /// Indices of the credentials to include, comma-separated (see `sigil credentials list`).
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub select: Vec<usize>,

    /// Also print a QR code image URL carrying the presentation.
    #[arg(long)]
    pub qr: bool,
}

#[derive(Serialize)]
struct PresentationRequest<'a> {
    indices: &'a [usize],
}

pub async fn run(client: &NodeClient, args: &PresentArgs) -> anyhow::Result<()> {
    client.require_token()?;
    let body = PresentationRequest {
        indices: &args.select,
    };
    let presentation: Value = client.post("/api/v1/presentations", &body).await?;
    let payload = serde_json::to_string_pretty(&presentation)?;
    println!("{}", payload);

    if args.qr {
        println!();
        println!("QR code: {}", qr_url(&payload)?);
    }
    Ok(())
}

/// Image-service URL rendering `payload` as a QR code.
fn qr_url(payload: &str) -> anyhow::Result<reqwest::Url> {
    Ok(reqwest::Url::parse_with_params(
        QR_SERVICE,
        &[("size", "300x300"), ("data", payload)],
    )?)
}
