use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigil_core::{
    Did, DidEvent, DidStateMachine, DidStatus, JobEvent, JobState, JobStateMachine,
    OperationType, VerificationStatus,
};
use uuid::Uuid;

use crate::document::{DidDocument, Service};
use crate::error::IdentityError;
use crate::operation::LedgerReceipt;

/// A DID owned by a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub did_identifier: String,
    pub did_document: DidDocument,
    /// Hex encoded Ed25519 public key.
    pub public_key: String,
    /// Envelope-sealed private key. `None` when the key was supplied by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_private_key: Option<String>,
    pub service_endpoints: Vec<Service>,
    pub status: DidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DidRecord {
    /// New record in `draft`.
    pub fn draft(
        owner_id: &str,
        did: &Did,
        document: DidDocument,
        public_key: String,
        sealed_private_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            did_identifier: did.uri().to_string(),
            service_endpoints: document.service.clone(),
            did_document: document,
            public_key,
            sealed_private_key,
            status: DidStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn did(&self) -> Result<Did, IdentityError> {
        Did::new(self.did_identifier.as_str()).map_err(|e| IdentityError::InvalidDid(e.to_string()))
    }

    /// Copy safe to hand out over the API.
    pub fn redacted(mut self) -> Self {
        self.sealed_private_key = None;
        self
    }

    /// Move through the DID lifecycle.
    pub fn apply(&mut self, event: DidEvent) -> Result<(), IdentityError> {
        self.status = DidStateMachine::transition(self.status, event)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// An anchoring operation submitted (or to be submitted) to the ledger.
/// Shares the DID status vocabulary: pending, anchored, failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorOperation {
    pub id: Uuid,
    pub did_id: Uuid,
    pub operation_type: OperationType,
    pub operation_data: serde_json::Value,
    pub status: DidStatus,
    pub transaction_id: Option<String>,
    pub block_height: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnchorOperation {
    pub fn pending(
        id: Uuid,
        did_id: Uuid,
        operation_type: OperationType,
        operation_data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            did_id,
            operation_type,
            operation_data,
            status: DidStatus::Pending,
            transaction_id: None,
            block_height: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.status == DidStatus::Anchored
    }

    pub fn mark_anchored(&mut self, receipt: &LedgerReceipt) -> Result<(), IdentityError> {
        self.status = DidStateMachine::transition(self.status, DidEvent::Anchor)?;
        self.transaction_id = Some(receipt.transaction_id.clone());
        self.block_height = Some(receipt.block_height);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), IdentityError> {
        self.status = DidStateMachine::transition(self.status, DidEvent::Fail)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn receipt(&self) -> Option<LedgerReceipt> {
        match (&self.transaction_id, self.block_height) {
            (Some(tx), Some(height)) => Some(LedgerReceipt {
                transaction_id: tx.clone(),
                block_height: height,
            }),
            _ => None,
        }
    }
}

/// Content-addressed copy of a DID document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRecord {
    pub id: Uuid,
    pub did_id: Uuid,
    pub ipfs_hash: String,
    pub content: serde_json::Value,
    pub pin_status: Option<String>,
    pub gateway_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PinRecord {
    /// Pin `document` under its content identifier.
    pub fn pinned(
        id: Uuid,
        did_id: Uuid,
        document: &DidDocument,
        gateway: &str,
    ) -> Result<Self, IdentityError> {
        let ipfs_hash = sigil_crypto::content_id(&document.canonical_bytes()?);
        let now = Utc::now();
        Ok(Self {
            id,
            did_id,
            gateway_url: Some(format!("{}/ipfs/{}", gateway.trim_end_matches('/'), ipfs_hash)),
            ipfs_hash,
            content: document.to_value()?,
            pin_status: Some("pinned".to_string()),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Outcome of a single verification check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// `passed` or `failed`.
    pub status: String,
    pub message: String,
}

/// Named verification checks, serialized as `{ name: { status, message } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checks(BTreeMap<String, CheckResult>);

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, passed: bool, message: impl Into<String>) {
        self.0.insert(
            name.to_string(),
            CheckResult {
                status: if passed { "passed" } else { "failed" }.to_string(),
                message: message.into(),
            },
        );
    }

    pub fn all_passed(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|c| c.status == "passed")
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The five checks recorded once an anchoring job completes.
    pub fn anchoring_completed() -> Self {
        let mut checks = Self::new();
        checks.record("didResolution", true, "DID created successfully");
        checks.record("documentIntegrity", true, "Document integrity verified");
        checks.record("keyGeneration", true, "Ed25519 keys generated");
        checks.record("ipfsStorage", true, "Document stored on IPFS");
        checks.record("ionAnchoring", true, "Operation anchored to ledger");
        checks
    }
}

/// Result of verifying a DID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub did_id: Uuid,
    pub verification_method: String,
    pub status: VerificationStatus,
    pub result: Option<Checks>,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Status is `verified` when every check passed, `failed` otherwise.
    pub fn from_checks(id: Uuid, did_id: Uuid, method: &str, checks: Checks) -> Self {
        let now = Utc::now();
        let passed = checks.all_passed();
        Self {
            id,
            did_id,
            verification_method: method.to_string(),
            status: if passed {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Failed
            },
            result: Some(checks),
            verified_at: passed.then_some(now),
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable unit of anchoring work for one DID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorJob {
    pub id: Uuid,
    pub did_id: Uuid,
    pub state: JobState,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Earliest time of the next attempt while backing off.
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnchorJob {
    pub fn queued(did_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            did_id,
            state: JobState::Queued,
            attempts: 0,
            last_error: None,
            not_before: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a queued job may be attempted at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Queued && self.not_before.map_or(true, |t| t <= now)
    }

    pub fn apply(&mut self, event: JobEvent) -> Result<(), IdentityError> {
        self.state = JobStateMachine::transition(self.state, event)?;
        if event == JobEvent::Start {
            self.attempts += 1;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
