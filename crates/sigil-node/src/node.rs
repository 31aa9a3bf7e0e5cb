//! The Sigil node orchestrator.
//!
//! Opens storage, starts the anchoring worker and the credential expiry
//! sweeper, and serves the HTTP API.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::anchoring;
use crate::auth::{self, Authenticator};
use crate::config::SigilConfig;
use crate::ledger::{self, Ledger};
use crate::state::AppState;
use crate::store::Store;

pub struct SigilNode {
    config: SigilConfig,
    store: Arc<Store>,
    ledger: Arc<dyn Ledger>,
    authenticator: Arc<dyn Authenticator>,
    /// Shared state of the running API; `None` before `start`.
    state: Option<Arc<AppState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SigilNode {
    /// Create a node from config: storage backend, ledger and authenticator.
    pub fn new(config: SigilConfig) -> Result<Self> {
        let store = Arc::new(Store::open(&config.storage)?);
        let ledger: Arc<dyn Ledger> = Arc::from(ledger::from_config(&config.anchoring)?);
        let authenticator = auth::from_config(&config.auth)?;
        Ok(Self::from_parts(config, store, ledger, authenticator))
    }

    /// Create a node over existing components.
    pub fn from_parts(
        config: SigilConfig,
        store: Arc<Store>,
        ledger: Arc<dyn Ledger>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            authenticator,
            state: None,
            tasks: Vec::new(),
        }
    }

    /// Start background tasks and the HTTP API. Returns the bound API address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        tracing::info!(
            storage = ?self.config.storage.backend,
            ledger = ?self.config.anchoring.ledger,
            did_method = %self.config.identity.did_method,
            "starting Sigil node"
        );

        let (mut worker, handle) = anchoring::channel(
            self.store.clone(),
            self.ledger.clone(),
            self.config.anchoring.clone(),
        );
        // Unfinished jobs are on the backlog before any request can hand one
        // to the worker.
        worker.recover()?;
        let state = Arc::new(AppState::new(
            self.config.clone(),
            self.store.clone(),
            self.authenticator.clone(),
            self.ledger.clone(),
            handle,
        )?);

        self.tasks.push(tokio::spawn(worker.run()));
        self.tasks.push(spawn_expiry_sweeper(
            state.clone(),
            Duration::from_secs(self.config.credentials.expiry_sweep_secs.max(1)),
        ));

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let (local_addr, api_task) = crate::api::start_api_server(api_addr, state.clone()).await?;
        self.tasks.push(api_task);

        self.state = Some(state);
        Ok(local_addr)
    }

    /// Stop every background task.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Sigil node");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state = None;
        tracing::info!("Sigil node shut down");
        Ok(())
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn state(&self) -> Option<&Arc<AppState>> {
        self.state.as_ref()
    }
}

fn spawn_expiry_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = state.wallet.expire_due(chrono::Utc::now()) {
                tracing::warn!(error = %e, "credential expiry sweep failed");
            }
        }
    })
}
