//! Ledger clients that anchor DID operations.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use sigil_identity::LedgerReceipt;

use crate::config::{AnchoringConfig, LedgerKind};
use crate::error::ServiceError;

/// Accepts an anchoring operation payload and returns where it landed.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn submit(&self, payload: &serde_json::Value) -> Result<LedgerReceipt, ServiceError>;
}

/// Build the ledger selected in config.
pub fn from_config(config: &AnchoringConfig) -> Result<Box<dyn Ledger>, ServiceError> {
    match config.ledger {
        LedgerKind::Simulated => Ok(Box::new(SimulatedLedger)),
        LedgerKind::Http => {
            let endpoint = config.ledger_endpoint.as_deref().ok_or_else(|| {
                ServiceError::Validation("anchoring.ledger_endpoint is required for the http ledger".into())
            })?;
            Ok(Box::new(HttpLedger::new(
                endpoint,
                Duration::from_millis(config.ledger_timeout_ms),
            )?))
        }
    }
}

/// In-process ledger issuing synthetic Bitcoin-style receipts.
pub struct SimulatedLedger;

#[async_trait]
impl Ledger for SimulatedLedger {
    async fn submit(&self, payload: &serde_json::Value) -> Result<LedgerReceipt, ServiceError> {
        let receipt = LedgerReceipt {
            transaction_id: format!("btc_tx_{}", sigil_crypto::random_hex(16)),
            block_height: rand::thread_rng().gen_range(800_000..900_000),
        };
        tracing::info!(
            tx = %receipt.transaction_id,
            block_height = receipt.block_height,
            operation = payload.get("type").and_then(|t| t.as_str()).unwrap_or("unknown"),
            "operation anchored on simulated ledger"
        );
        Ok(receipt)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerReply {
    transaction_id: String,
    block_height: u64,
}

/// Posts payloads to an external anchoring service.
pub struct HttpLedger {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpLedger {
    /// Every request is abandoned after `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ExternalService(format!("ledger client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn submit(&self, payload: &serde_json::Value) -> Result<LedgerReceipt, ServiceError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::ExternalService(format!(
                        "ledger did not respond: {}",
                        self.endpoint
                    ))
                } else {
                    ServiceError::ExternalService(format!("ledger unreachable: {}", e))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalService(format!(
                "ledger rejected operation ({}): {}",
                status, body
            )));
        }

        let reply: LedgerReply = resp
            .json()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("invalid ledger reply: {}", e)))?;

        tracing::info!(
            tx = %reply.transaction_id,
            block_height = reply.block_height,
            endpoint = %self.endpoint,
            "operation anchored"
        );
        Ok(LedgerReceipt {
            transaction_id: reply.transaction_id,
            block_height: reply.block_height,
        })
    }
}
