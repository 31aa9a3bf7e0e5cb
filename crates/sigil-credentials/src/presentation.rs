use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::CREDENTIALS_CONTEXT;
use crate::error::CredentialError;

/// Placeholder proof attached to a presentation. Nothing is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_purpose: String,
    pub jws: String,
}

/// W3C verifiable presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiablePresentation {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub presentation_type: Vec<String>,
    pub verifiable_credential: Vec<Value>,
    pub holder: String,
    pub proof: PresentationProof,
}

impl VerifiablePresentation {
    /// Pretty JSON; this is the payload encoded into QR codes.
    pub fn to_json_pretty(&self) -> Result<String, CredentialError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builds presentations from a holder's stored credential documents.
pub struct PresentationBuilder<'a> {
    holder: &'a str,
    credentials: &'a [Value],
}

impl<'a> PresentationBuilder<'a> {
    pub fn new(holder: &'a str, credentials: &'a [Value]) -> Self {
        Self {
            holder,
            credentials,
        }
    }

    /// Embed the credentials at `selection`, in selection order. Repeated
    /// indices are embedded once.
    pub fn build(&self, selection: &[usize]) -> Result<VerifiablePresentation, CredentialError> {
        if selection.is_empty() {
            return Err(CredentialError::EmptySelection);
        }

        let mut seen = Vec::with_capacity(selection.len());
        let mut selected = Vec::with_capacity(selection.len());
        for &index in selection {
            let credential =
                self.credentials
                    .get(index)
                    .ok_or(CredentialError::InvalidSelection {
                        index,
                        available: self.credentials.len(),
                    })?;
            if !seen.contains(&index) {
                seen.push(index);
                selected.push(credential.clone());
            }
        }

        let now = Utc::now();
        let vp = VerifiablePresentation {
            context: vec![CREDENTIALS_CONTEXT.to_string()],
            presentation_type: vec!["VerifiablePresentation".to_string()],
            verifiable_credential: selected,
            holder: self.holder.to_string(),
            proof: PresentationProof {
                proof_type: "Ed25519Signature2020".to_string(),
                created: now,
                verification_method: format!("{}#key-1", self.holder),
                proof_purpose: "authentication".to_string(),
                jws: format!("mock_signature_{}", now.timestamp_millis()),
            },
        };

        tracing::debug!(
            holder = %self.holder,
            credentials = vp.verifiable_credential.len(),
            "presentation assembled"
        );

        Ok(vp)
    }
}
