//! DID queries, statistics and on-demand re-verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sigil_core::{DidStatus, VerificationStatus};
use sigil_crypto::PublicKey;
use sigil_identity::{
    AnchorOperation, Checks, DidDocument, DidRecord, PinRecord, VerificationRecord,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::store::Store;

const RECENT_LIMIT: usize = 10;
const ON_DEMAND_METHOD: &str = "on-demand";

/// The caller's DID with everything recorded about it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDetails {
    pub did: DidRecord,
    pub operations: Vec<AnchorOperation>,
    pub ipfs_pins: Vec<PinRecord>,
    pub verifications: Vec<VerificationRecord>,
}

/// Public view of a DID.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidSummary {
    pub id: Uuid,
    pub did_identifier: String,
    pub public_key: String,
    pub status: DidStatus,
    pub created_at: DateTime<Utc>,
}

impl From<DidRecord> for DidSummary {
    fn from(r: DidRecord) -> Self {
        Self {
            id: r.id,
            did_identifier: r.did_identifier,
            public_key: r.public_key,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total: usize,
    pub anchored: usize,
    pub pending: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_dids: usize,
    pub verified_dids: usize,
    pub ipfs_pins: usize,
    pub pending_operations: usize,
}

pub struct ExplorerService {
    store: Arc<Store>,
}

impl ExplorerService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn own_did(&self, user: &CurrentUser) -> Result<DidRecord, ServiceError> {
        self.store
            .did_by_owner(&user.id)?
            .ok_or_else(|| ServiceError::NotFound("No DID found for this user".into()))
    }

    pub fn my_did(&self, user: &CurrentUser) -> Result<DidDetails, ServiceError> {
        let did = self.own_did(user)?;
        Ok(DidDetails {
            operations: self.store.operations_for_did(did.id)?,
            ipfs_pins: self.store.pins_for_did(did.id)?,
            verifications: self.store.verifications_for_did(did.id)?,
            did: did.redacted(),
        })
    }

    pub fn resolve(&self, identifier: &str) -> Result<DidDocument, ServiceError> {
        self.store
            .did_by_identifier(identifier.trim())?
            .map(|d| d.did_document)
            .ok_or_else(|| ServiceError::NotFound("DID not found".into()))
    }

    /// DIDs matching `query`; the most recent DIDs when the query is blank.
    pub fn search(&self, query: Option<&str>) -> Result<Vec<DidSummary>, ServiceError> {
        let dids = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.store.search_dids(q)?,
            None => self.store.list_dids()?,
        };
        Ok(dids
            .into_iter()
            .take(RECENT_LIMIT)
            .map(DidSummary::from)
            .collect())
    }

    pub fn global_stats(&self) -> Result<GlobalStats, ServiceError> {
        let mut stats = GlobalStats::default();
        for did in self.store.list_dids()? {
            stats.total += 1;
            match did.status {
                DidStatus::Anchored => stats.anchored += 1,
                DidStatus::Pending => stats.pending += 1,
                DidStatus::Failed => stats.failed += 1,
                DidStatus::Draft => {}
            }
        }
        Ok(stats)
    }

    pub fn user_stats(&self, user: &CurrentUser) -> Result<UserStats, ServiceError> {
        let Some(did) = self.store.did_by_owner(&user.id)? else {
            return Ok(UserStats::default());
        };
        Ok(UserStats {
            total_dids: 1,
            verified_dids: self
                .store
                .verifications_for_did(did.id)?
                .iter()
                .filter(|v| v.status == VerificationStatus::Verified)
                .count(),
            ipfs_pins: self.store.pins_for_did(did.id)?.len(),
            pending_operations: self
                .store
                .operations_for_did(did.id)?
                .iter()
                .filter(|o| o.status == DidStatus::Pending)
                .count(),
        })
    }

    /// Check the caller's DID against what is stored and record the outcome.
    pub fn reverify(&self, user: &CurrentUser) -> Result<VerificationRecord, ServiceError> {
        let did = self.own_did(user)?;
        let checks = self.run_checks(&did)?;
        let record = VerificationRecord::from_checks(Uuid::now_v7(), did.id, ON_DEMAND_METHOD, checks);
        self.store.insert_verification(&record)?;

        tracing::info!(did = %did.did_identifier, status = %record.status, "DID re-verified");
        Ok(record)
    }

    fn run_checks(&self, did: &DidRecord) -> Result<Checks, ServiceError> {
        let doc = &did.did_document;
        let mut checks = Checks::new();

        let resolves = self
            .store
            .did_by_identifier(&did.did_identifier)?
            .is_some_and(|r| r.id == did.id);
        checks.record(
            "didResolution",
            resolves,
            if resolves { "DID resolves to this record" } else { "DID does not resolve" },
        );

        let integrity = doc.id == did.did_identifier
            && doc
                .verification_method
                .iter()
                .all(|vm| vm.controller == did.did_identifier);
        checks.record(
            "documentIntegrity",
            integrity,
            if integrity {
                "Document id and controllers match the DID"
            } else {
                "Document does not match the DID"
            },
        );

        let expected_key = PublicKey::from_hex(&did.public_key)
            .ok()
            .map(|pk| pk.to_multibase());
        let key_matches = expected_key.is_some() && doc.primary_key_multibase() == expected_key.as_deref();
        checks.record(
            "keyGeneration",
            key_matches,
            if key_matches {
                "Verification key matches the stored public key"
            } else {
                "Verification key does not match the stored public key"
            },
        );

        let cid = sigil_crypto::content_id(&doc.canonical_bytes()?);
        let pinned = self
            .store
            .pins_for_did(did.id)?
            .iter()
            .any(|p| p.ipfs_hash == cid);
        checks.record(
            "ipfsStorage",
            pinned,
            if pinned { "Current document is pinned" } else { "No pin matches the current document" },
        );

        let anchored = self
            .store
            .operations_for_did(did.id)?
            .iter()
            .any(AnchorOperation::is_anchored);
        checks.record(
            "ionAnchoring",
            anchored,
            if anchored { "Anchored operation found" } else { "No anchored operation" },
        );

        Ok(checks)
    }

    /// Delete the caller's DID. Only a `failed` DID can be retired.
    pub fn retire(&self, user: &CurrentUser) -> Result<DidRecord, ServiceError> {
        let did = self.own_did(user)?;
        if did.status != DidStatus::Failed {
            return Err(ServiceError::InvalidState(format!(
                "Only failed DIDs can be retired; this DID is {}",
                did.status
            )));
        }
        let removed = self.store.delete_did_cascade(did.id)?;
        tracing::info!(did = %removed.did_identifier, owner = %user.id, "failed DID retired");
        Ok(removed.redacted())
    }
}
