//! Harness for cross-crate scenarios: an in-process node over a memory
//! store, driven through its HTTP API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use sigil_identity::LedgerReceipt;
use sigil_node::auth::AuthUser;
use sigil_node::{Ledger, ServiceError, SigilConfig, SigilNode, SimulatedLedger, StaticAuthenticator, Store};

/// Users known to every test node: `(token, id, email)`.
pub const USERS: [(&str, &str, &str); 4] = [
    ("alice-token", "alice", "alice@example.org"),
    ("bob-token", "bob", "bob@example.org"),
    ("carol-token", "carol", "carol@university.example"),
    ("admin-token", "admin", "admin@example.org"),
];

/// Ledger that fails its first `failures` submissions.
pub struct FlakyLedger {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyLedger {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn submit(&self, payload: &Value) -> Result<LedgerReceipt, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ServiceError::ExternalService(format!("ledger unavailable (call {})", call)));
        }
        SimulatedLedger.submit(payload).await
    }
}

pub struct TestNode {
    pub node: SigilNode,
    pub base: String,
    client: reqwest::Client,
}

impl TestNode {
    pub async fn start() -> Self {
        Self::with_ledger(Arc::new(SimulatedLedger), SigilConfig::ephemeral()).await
    }

    pub async fn with_ledger(ledger: Arc<dyn Ledger>, mut config: SigilConfig) -> Self {
        config.auth.bootstrap_admins = vec!["admin".into()];
        config.anchoring.base_backoff_ms = 10;

        let auth = StaticAuthenticator::new();
        for (token, id, email) in USERS {
            auth.insert(
                token,
                AuthUser {
                    id: id.into(),
                    email: Some(email.into()),
                },
            );
        }

        let mut node = SigilNode::from_parts(config, Arc::new(Store::memory()), ledger, Arc::new(auth));
        let addr = node.start().await.expect("node starts");
        Self {
            node,
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        self.node.store()
    }

    async fn send(&self, req: reqwest::RequestBuilder, token: Option<&str>) -> (StatusCode, Value) {
        let req = match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        };
        let resp = req.send().await.expect("request reaches node");
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, token: Option<&str>, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(format!("{}{}", self.base, path)), token)
            .await
    }

    pub async fn post(&self, token: Option<&str>, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(format!("{}{}", self.base, path)).json(&body), token)
            .await
    }

    pub async fn delete(&self, token: Option<&str>, path: &str) -> (StatusCode, Value) {
        self.send(self.client.delete(format!("{}{}", self.base, path)), token)
            .await
    }

    /// Sign `token`'s user in, creating their profile.
    pub async fn sign_in(&self, token: &str) -> Value {
        let (status, body) = self.get(Some(token), "/api/v1/profile").await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"].clone()
    }

    /// Poll `GET /api/v1/dids/me` until the DID reaches `status`.
    pub async fn wait_for_did_status(&self, token: &str, status: &str) -> Value {
        for _ in 0..200 {
            let (code, body) = self.get(Some(token), "/api/v1/dids/me").await;
            if code == StatusCode::OK && body["data"]["did"]["status"] == status {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("DID of {} never reached status {}", token, status);
    }
}
