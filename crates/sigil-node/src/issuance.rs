//! DID issuance: one DID per user, anchored in the background.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sigil_core::{DidEvent, DidStatus};
use sigil_crypto::{KeyPair, MasterKey, PublicKey};
use sigil_identity::{AnchorJob, DidDocument, DidFactory, DidRecord};
use uuid::Uuid;

use crate::anchoring::AnchorHandle;
use crate::config::IdentityConfig;
use crate::error::{ServiceError, StoreError};
use crate::store::Store;

/// Body of `POST /functions/generate-did`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDidRequest {
    #[serde(default)]
    pub include_service: bool,
    #[serde(default)]
    pub service_endpoint: Option<String>,
    /// Hex encoded Ed25519 public key held by the client.
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDidResponse {
    pub did_id: Uuid,
    pub did: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub did_document: DidDocument,
    /// Always `pending`; the pin is written by the anchoring job.
    pub ipfs_hash: String,
    pub status: DidStatus,
    pub job_id: Uuid,
}

struct KeyMaterial {
    public_key: PublicKey,
    sealed: Option<String>,
    exposed: Option<String>,
}

pub struct IssuanceService {
    store: Arc<Store>,
    factory: DidFactory,
    master_key: MasterKey,
    return_private_key: bool,
    anchor: AnchorHandle,
}

impl IssuanceService {
    pub fn new(
        store: Arc<Store>,
        config: &IdentityConfig,
        anchor: AnchorHandle,
    ) -> Result<Self, ServiceError> {
        let factory = DidFactory::new(&config.did_method)?;
        let master_key = match config.master_key.as_deref() {
            Some(hex) => MasterKey::from_hex(hex)
                .map_err(|e| ServiceError::Validation(format!("identity.master_key: {}", e)))?,
            None => {
                tracing::warn!(
                    "no identity.master_key configured; sealed private keys will not survive a restart"
                );
                MasterKey::generate()
            }
        };
        Ok(Self {
            store,
            factory,
            master_key,
            return_private_key: config.return_private_key,
            anchor,
        })
    }

    pub fn factory(&self) -> &DidFactory {
        &self.factory
    }

    /// Issue a DID for `owner_id` and queue it for anchoring.
    pub async fn generate(
        &self,
        owner_id: &str,
        request: GenerateDidRequest,
    ) -> Result<GenerateDidResponse, ServiceError> {
        let existing = self.store.did_by_owner(owner_id).map_err(|e| {
            tracing::error!(owner = %owner_id, error = %e, "DID lookup failed");
            ServiceError::Storage("Database error".into())
        })?;
        if existing.is_some() {
            return Err(ServiceError::Conflict("User already has a DID".into()));
        }

        let keys = self.key_material(request.public_key.as_deref())?;
        let (did, document) = self.factory.assemble(
            &keys.public_key,
            request.include_service,
            request.service_endpoint.as_deref(),
        );

        let mut record = DidRecord::draft(
            owner_id,
            &did,
            document,
            keys.public_key.to_hex(),
            keys.sealed,
        );
        record.apply(DidEvent::Submit)?;
        let job = AnchorJob::queued(record.id);

        self.store.insert_did(&record, &job).map_err(|e| match e {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => {
                tracing::error!(owner = %owner_id, error = %other, "DID insert failed");
                ServiceError::Storage("Failed to save DID".into())
            }
        })?;

        tracing::info!(did = %did, owner = %owner_id, job_id = %job.id, "DID issued");

        // The job is durable; a missed hand-off is picked up by the worker's rescan.
        if let Err(e) = self.anchor.enqueue(job.id) {
            tracing::warn!(job_id = %job.id, error = %e, "anchoring job not handed off");
        }

        Ok(GenerateDidResponse {
            did_id: record.id,
            did: record.did_identifier,
            public_key: record.public_key,
            private_key: keys.exposed,
            did_document: record.did_document,
            ipfs_hash: "pending".into(),
            status: record.status,
            job_id: job.id,
        })
    }

    fn key_material(&self, client_key: Option<&str>) -> Result<KeyMaterial, ServiceError> {
        if let Some(hex) = client_key.map(str::trim).filter(|k| !k.is_empty()) {
            let lower_hex = hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
            if !lower_hex {
                return Err(ServiceError::Validation(
                    "publicKey must be 64 lowercase hex characters".into(),
                ));
            }
            let public_key = PublicKey::from_hex(hex)
                .map_err(|e| ServiceError::Validation(format!("invalid publicKey: {}", e)))?;
            return Ok(KeyMaterial {
                public_key,
                sealed: None,
                exposed: None,
            });
        }

        let keypair = KeyPair::generate();
        let sealed = self.master_key.seal(&keypair.secret_bytes()[..]).map_err(|e| {
            tracing::error!(error = %e, "sealing private key failed");
            ServiceError::Storage("Failed to save DID".into())
        })?;
        Ok(KeyMaterial {
            public_key: keypair.public_key(),
            sealed: Some(sealed.into_string()),
            exposed: self
                .return_private_key
                .then(|| keypair.secret_hex().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{self, AnchorWorker};
    use crate::config::AnchoringConfig;
    use crate::ledger::{Ledger, SimulatedLedger};
    use async_trait::async_trait;
    use sigil_crypto::SealedKey;
    use sigil_identity::LedgerReceipt;
    use std::time::Duration;

    /// Never answers.
    struct HungLedger;

    #[async_trait]
    impl Ledger for HungLedger {
        async fn submit(&self, _payload: &serde_json::Value) -> Result<LedgerReceipt, ServiceError> {
            std::future::pending().await
        }
    }

    fn service(config: IdentityConfig) -> (IssuanceService, AnchorWorker, Arc<Store>) {
        let store = Arc::new(Store::memory());
        let (worker, handle) = anchoring::channel(
            store.clone(),
            Arc::new(SimulatedLedger),
            AnchoringConfig::default(),
        );
        let svc = IssuanceService::new(store.clone(), &config, handle).unwrap();
        (svc, worker, store)
    }

    #[tokio::test]
    async fn test_generate_pending_did() {
        let (svc, _worker, store) = service(IdentityConfig::default());
        let resp = svc
            .generate("u1", GenerateDidRequest::default())
            .await
            .unwrap();

        assert!(resp.did.starts_with("did:ion:"));
        assert_eq!(resp.status, DidStatus::Pending);
        assert_eq!(resp.ipfs_hash, "pending");
        assert!(resp.private_key.is_none());
        assert!(resp.did_document.service.is_empty());

        let record = store.get_did(resp.did_id).unwrap().unwrap();
        assert_eq!(record.status, DidStatus::Pending);
        assert!(record.sealed_private_key.is_some());
        assert_eq!(store.get_job(resp.job_id).unwrap().unwrap().did_id, record.id);
    }

    #[tokio::test]
    async fn test_generate_does_not_wait_on_stalled_worker() {
        let store = Arc::new(Store::memory());
        let (worker, handle) = anchoring::channel(
            store.clone(),
            Arc::new(HungLedger),
            AnchoringConfig {
                queue_capacity: 1,
                ..AnchoringConfig::default()
            },
        );
        let worker_task = tokio::spawn(worker.run());
        let svc = IssuanceService::new(store.clone(), &IdentityConfig::default(), handle).unwrap();

        for owner in ["u1", "u2", "u3"] {
            let resp = tokio::time::timeout(
                Duration::from_secs(2),
                svc.generate(owner, GenerateDidRequest::default()),
            )
            .await
            .expect("generate returns while the worker is stuck")
            .unwrap();
            assert_eq!(resp.status, DidStatus::Pending);
        }
        worker_task.abort();

        assert_eq!(store.list_dids().unwrap().len(), 3);
        assert_eq!(store.unfinished_jobs().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_second_did_rejected() {
        let (svc, _worker, store) = service(IdentityConfig::default());
        svc.generate("u1", GenerateDidRequest::default()).await.unwrap();
        let err = svc
            .generate("u1", GenerateDidRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(err.to_string(), "User already has a DID");
        assert_eq!(store.list_dids().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_service_endpoint() {
        let (svc, _worker, _) = service(IdentityConfig::default());
        let resp = svc
            .generate(
                "u1",
                GenerateDidRequest {
                    include_service: true,
                    service_endpoint: Some("https://example.org".into()),
                    public_key: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.did_document.service.len(), 1);

        let resp = svc
            .generate(
                "u2",
                GenerateDidRequest {
                    include_service: true,
                    service_endpoint: Some("  ".into()),
                    public_key: None,
                },
            )
            .await
            .unwrap();
        let json = serde_json::to_value(&resp.did_document).unwrap();
        assert!(json.get("service").is_none());
    }

    #[tokio::test]
    async fn test_client_supplied_key() {
        let (svc, _worker, store) = service(IdentityConfig::default());
        let pk = KeyPair::generate().public_key();
        let resp = svc
            .generate(
                "u1",
                GenerateDidRequest {
                    public_key: Some(pk.to_hex()),
                    ..GenerateDidRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.public_key, pk.to_hex());
        assert!(store
            .get_did(resp.did_id)
            .unwrap()
            .unwrap()
            .sealed_private_key
            .is_none());

        let err = svc
            .generate(
                "u2",
                GenerateDidRequest {
                    public_key: Some("ABCD".into()),
                    ..GenerateDidRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_private_key_exposed_only_when_enabled() {
        let master = MasterKey::generate();
        let config = IdentityConfig {
            master_key: Some(master.to_hex().to_string()),
            return_private_key: true,
            ..IdentityConfig::default()
        };
        let (svc, _worker, store) = service(config);
        let resp = svc.generate("u1", GenerateDidRequest::default()).await.unwrap();

        let exposed = resp.private_key.unwrap();
        let sealed = store
            .get_did(resp.did_id)
            .unwrap()
            .unwrap()
            .sealed_private_key
            .unwrap();
        let opened = master.open(&SealedKey::from_hex(sealed)).unwrap();
        assert_eq!(hex::encode(&opened[..]), exposed);
    }
}
