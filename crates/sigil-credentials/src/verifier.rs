use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CredentialError;

const UNKNOWN_ISSUER: &str = "Unknown Issuer";
const UNKNOWN_HOLDER: &str = "unknown";

/// Summary of one credential found in a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    /// Issuer display name.
    pub issuer: String,
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    pub verified: bool,
    pub revoked: bool,
    pub issuance_date: String,
    pub credential_subject: Value,
}

/// Outcome of reading a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub holder: String,
    pub valid_presentation: bool,
    /// Always false: proofs are not cryptographically checked.
    pub signature_checked: bool,
    /// Input was not a JSON object and was read as a bare holder identifier.
    pub opaque: bool,
    pub credentials: Vec<CredentialSummary>,
}

/// Reads presentations and reports the credentials they carry.
///
/// Credentials are reported as verified without checking their proofs.
pub struct PresentationVerifier;

impl PresentationVerifier {
    pub fn verify(input: &str) -> Result<VerificationReport, CredentialError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Validation(
                "Please provide a VP to verify".into(),
            ));
        }

        let report = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(vp)) => Self::read_presentation(&vp),
            _ => VerificationReport {
                holder: trimmed.to_string(),
                valid_presentation: true,
                signature_checked: false,
                opaque: true,
                credentials: Vec::new(),
            },
        };

        tracing::info!(
            holder = %report.holder,
            credentials = report.credentials.len(),
            opaque = report.opaque,
            "presentation verified"
        );

        Ok(report)
    }

    fn read_presentation(vp: &Map<String, Value>) -> VerificationReport {
        let holder = vp
            .get("holder")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .unwrap_or(UNKNOWN_HOLDER)
            .to_string();

        let credentials = match vp.get("verifiableCredential") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        };

        VerificationReport {
            holder,
            valid_presentation: true,
            signature_checked: false,
            opaque: false,
            credentials: credentials
                .into_iter()
                .enumerate()
                .map(|(index, vc)| summarize(index, vc))
                .collect(),
        }
    }
}

fn summarize(index: usize, vc: &Value) -> CredentialSummary {
    let id = vc
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("credential-{}", index));

    let issuer = match vc.get("issuer") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Object(o)) => o
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_ISSUER)
            .to_string(),
        _ => UNKNOWN_ISSUER.to_string(),
    };

    let credential_type = match vc.get("type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec!["VerifiableCredential".to_string()],
    };

    let issuance_date = vc
        .get("issuanceDate")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    CredentialSummary {
        id,
        issuer,
        credential_type,
        verified: true,
        revoked: false,
        issuance_date,
        credential_subject: vc
            .get("credentialSubject")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    }
}
