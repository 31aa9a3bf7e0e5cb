use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sigil_core::{CredentialEvent, CredentialStateMachine, CredentialStatus};
use uuid::Uuid;

use crate::error::CredentialError;

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const EXAMPLES_CONTEXT: &str = "https://www.w3.org/2018/credentials/examples/v1";
pub const DEFAULT_CREDENTIAL_TYPE: &str = "EducationCredential";
const PLACEHOLDER_SIGNATURE: &str = "mock-signature-value";

/// Assembles a verifiable credential document.
///
/// The proof block is a placeholder; credentials are not signed.
#[derive(Debug, Clone)]
pub struct CredentialBuilder {
    issuer_did: String,
    issuer_name: String,
    credential_type: String,
    subject_id: String,
    claims: Map<String, Value>,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialBuilder {
    pub fn new(issuer_did: impl Into<String>, issuer_name: impl Into<String>) -> Self {
        Self {
            issuer_did: issuer_did.into(),
            issuer_name: issuer_name.into(),
            credential_type: DEFAULT_CREDENTIAL_TYPE.to_string(),
            subject_id: String::new(),
            claims: Map::new(),
            expires_at: None,
        }
    }

    /// Credential type; blank values keep the default.
    pub fn credential_type(mut self, credential_type: &str) -> Self {
        let trimmed = credential_type.trim();
        if !trimmed.is_empty() {
            self.credential_type = trimmed.to_string();
        }
        self
    }

    pub fn subject(mut self, subject_id: impl Into<String>, claims: Map<String, Value>) -> Self {
        self.subject_id = subject_id.into();
        self.claims = claims;
        self
    }

    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Build the document. The subject claims must carry a non-empty `name`.
    pub fn build(self) -> Result<(String, Value), CredentialError> {
        let has_name = self
            .claims
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(CredentialError::Validation(
                "Credential subject name is required".into(),
            ));
        }
        if self.subject_id.trim().is_empty() {
            return Err(CredentialError::Validation(
                "Credential subject id is required".into(),
            ));
        }

        let now = Utc::now();
        let credential_id = format!("vc:{}", Uuid::now_v7());

        let mut subject = Map::new();
        subject.insert("id".into(), Value::String(self.subject_id));
        for (k, v) in self.claims {
            if k != "id" {
                subject.insert(k, v);
            }
        }

        let mut doc = json!({
            "@context": [CREDENTIALS_CONTEXT, EXAMPLES_CONTEXT],
            "id": credential_id,
            "type": ["VerifiableCredential", self.credential_type],
            "issuer": {
                "id": self.issuer_did,
                "name": self.issuer_name,
            },
            "issuanceDate": now.to_rfc3339(),
            "credentialSubject": subject,
            "proof": {
                "type": "Ed25519Signature2020",
                "created": now.to_rfc3339(),
                "verificationMethod": format!("{}#key-1", self.issuer_did),
                "proofPurpose": "assertionMethod",
                "signatureValue": PLACEHOLDER_SIGNATURE,
            },
        });
        if let (Some(expires), Some(obj)) = (self.expires_at, doc.as_object_mut()) {
            obj.insert("expirationDate".into(), Value::String(expires.to_rfc3339()));
        }

        Ok((credential_id, doc))
    }
}

/// A credential held in the store on behalf of its holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: Uuid,
    pub holder_id: String,
    pub issuer_id: String,
    pub credential_id: String,
    pub credential_type: String,
    pub credential_data: Value,
    pub status: CredentialStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn active(
        holder_id: &str,
        issuer_id: &str,
        credential_id: String,
        credential_type: &str,
        credential_data: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            holder_id: holder_id.to_string(),
            issuer_id: issuer_id.to_string(),
            credential_id,
            credential_type: credential_type.to_string(),
            credential_data,
            status: CredentialStatus::Active,
            issued_at: now,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, event: CredentialEvent) -> Result<(), CredentialError> {
        self.status = CredentialStateMachine::transition(self.status, event)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Active and past its expiry.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == CredentialStatus::Active && self.expires_at.is_some_and(|e| e <= now)
    }
}
