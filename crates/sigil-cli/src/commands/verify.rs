//! `sigil verify`: Verify a presentation.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::NodeClient;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Presentation JSON (as string or path to file).
    pub presentation: String,
}

#[derive(Serialize)]
struct VerifyRequest {
    presentation: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationReport {
    holder: String,
    valid_presentation: bool,
    signature_checked: bool,
    #[serde(default)]
    opaque: bool,
    credentials: Vec<CredentialSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialSummary {
    id: String,
    issuer: String,
    #[serde(rename = "type")]
    credential_type: Vec<String>,
    verified: bool,
    revoked: bool,
    issuance_date: String,
    credential_subject: Value,
}

pub async fn run(client: &NodeClient, args: &VerifyArgs) -> anyhow::Result<()> {
    // Try reading as file first, then as inline text
    let presentation = if std::path::Path::new(&args.presentation).exists() {
        std::fs::read_to_string(&args.presentation)?
    } else {
        args.presentation.clone()
    };

    let report: VerificationReport = client
        .post("/api/v1/presentations/verify", &VerifyRequest { presentation })
        .await?;

    if report.valid_presentation {
        println!("Presentation is VALID");
    } else {
        println!("Presentation is INVALID");
    }
    println!("  Holder:    {}", report.holder);
    if !report.signature_checked {
        println!("  Signature: not checked");
    }
    if report.opaque {
        println!("  Input was not a JSON presentation; reported as an opaque holder identifier.");
    }
    println!();

    for credential in &report.credentials {
        let icon = if credential.verified && !credential.revoked { "PASS" } else { "FAIL" };
        println!("  [{}] {}", icon, credential.credential_type.join(", "));
        println!("      ID:      {}", credential.id);
        println!("      Issuer:  {}", credential.issuer);
        println!("      Issued:  {}", credential.issuance_date);
        if let Value::Object(subject) = &credential.credential_subject {
            for (claim, value) in subject {
                match value.as_str() {
                    Some(s) => println!("      {}: {}", claim, s),
                    None => println!("      {}: {}", claim, value),
                }
            }
        }
    }
    Ok(())
}
