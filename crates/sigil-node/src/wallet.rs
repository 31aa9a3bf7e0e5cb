//! Verifiable credentials: issuance, holder wallet, presentations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use sigil_core::{CredentialEvent, Role};
use sigil_credentials::{
    CredentialBuilder, PresentationBuilder, PresentationVerifier, StoredCredential,
    VerifiablePresentation, VerificationReport,
};
use sigil_identity::DidFactory;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::store::Store;

/// Body of `POST /api/v1/credentials/issue`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialRequest {
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub credential_type: Option<String>,
    /// Subject claims; must include `name`.
    #[serde(default)]
    pub claims: Map<String, Value>,
    #[serde(default)]
    pub recipient_did: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/v1/presentations`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresentationRequest {
    #[serde(default)]
    pub indices: Vec<usize>,
}

/// Body of `POST /api/v1/presentations/verify`. The presentation is
/// normally a JSON string; an embedded object is accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub presentation: Value,
}

impl VerifyRequest {
    pub fn input(&self) -> String {
        match &self.presentation {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

pub struct WalletService {
    store: Arc<Store>,
    factory: DidFactory,
}

impl WalletService {
    pub fn new(store: Arc<Store>, factory: DidFactory) -> Self {
        Self { store, factory }
    }

    /// Issue a credential to the profile registered under `recipient_email`.
    pub fn issue(
        &self,
        user: &CurrentUser,
        request: IssueCredentialRequest,
    ) -> Result<StoredCredential, ServiceError> {
        user.require(&[Role::Issuer, Role::Admin])?;

        if request.recipient_email.trim().is_empty() {
            return Err(ServiceError::Validation("Recipient email is required".into()));
        }
        let recipient = self
            .store
            .find_profile_by_email(&request.recipient_email)?
            .ok_or_else(|| ServiceError::NotFound("Recipient not found".into()))?;

        if let Some(expires) = request.expires_at {
            if expires <= Utc::now() {
                return Err(ServiceError::Validation("Expiry date must be in the future".into()));
            }
        }

        let issuer_name = request
            .organization_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| user.email.clone())
            .unwrap_or_else(|| user.id.clone());
        let subject_id = request
            .recipient_did
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.factory
                    .holder_did(recipient.email.as_deref().unwrap_or(&recipient.id))
            });

        let (credential_id, document) =
            CredentialBuilder::new(self.factory.issuer_did(&user.id), issuer_name)
                .credential_type(request.credential_type.as_deref().unwrap_or_default())
                .subject(subject_id, request.claims)
                .expires_at(request.expires_at)
                .build()?;
        let credential_type = document["type"][1]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let stored = StoredCredential::active(
            &recipient.id,
            &user.id,
            credential_id,
            &credential_type,
            document,
            request.expires_at,
        );
        self.store.insert_credential(&stored)?;

        tracing::info!(
            credential = %stored.credential_id,
            issuer = %user.id,
            holder = %recipient.id,
            credential_type = %credential_type,
            "credential issued"
        );
        Ok(stored)
    }

    /// The caller's active credentials, oldest issuance first. Presentation
    /// indices refer to this order.
    pub fn holder_credentials(&self, user: &CurrentUser) -> Result<Vec<StoredCredential>, ServiceError> {
        Ok(self.store.credentials_for_holder(&user.id, true)?)
    }

    pub fn issued_credentials(&self, user: &CurrentUser) -> Result<Vec<StoredCredential>, ServiceError> {
        user.require(&[Role::Issuer, Role::Admin])?;
        Ok(self.store.credentials_issued_by(&user.id)?)
    }

    /// Revoke a credential. Issuers may revoke only what they issued.
    pub fn revoke(&self, user: &CurrentUser, id: Uuid) -> Result<StoredCredential, ServiceError> {
        user.require(&[Role::Issuer, Role::Admin])?;
        let credential = self
            .store
            .get_credential(id)?
            .ok_or_else(|| ServiceError::NotFound("Credential not found".into()))?;
        if user.role != Role::Admin && credential.issuer_id != user.id {
            return Err(ServiceError::Forbidden(
                "Only the issuing issuer can revoke this credential".into(),
            ));
        }

        let revoked = self
            .store
            .update_credential(id, |c| Ok(c.apply(CredentialEvent::Revoke)?))?;
        tracing::info!(credential = %revoked.credential_id, by = %user.id, "credential revoked");
        Ok(revoked)
    }

    /// Bundle the selected active credentials under the caller's DID.
    pub fn present(
        &self,
        user: &CurrentUser,
        indices: &[usize],
    ) -> Result<VerifiablePresentation, ServiceError> {
        let did = self
            .store
            .did_by_owner(&user.id)?
            .ok_or_else(|| ServiceError::NotFound("Create a DID before building presentations".into()))?;
        let documents: Vec<Value> = self
            .holder_credentials(user)?
            .into_iter()
            .map(|c| c.credential_data)
            .collect();

        Ok(PresentationBuilder::new(&did.did_identifier, &documents).build(indices)?)
    }

    pub fn verify(&self, input: &str) -> Result<VerificationReport, ServiceError> {
        Ok(PresentationVerifier::verify(input)?)
    }

    /// Move active credentials past their expiry to `expired`.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let mut expired = 0;
        for credential in self.store.list_credentials()? {
            if !credential.is_due_for_expiry(now) {
                continue;
            }
            self.store.update_credential(credential.id, |c| {
                if c.is_due_for_expiry(now) {
                    c.apply(CredentialEvent::Expire)?;
                }
                Ok(())
            })?;
            expired += 1;
        }
        if expired > 0 {
            tracing::info!(count = expired, "credentials expired");
        }
        Ok(expired)
    }
}
