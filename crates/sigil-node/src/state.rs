//! Shared state handed to every HTTP handler.

use std::sync::Arc;
use std::time::Instant;

use crate::admin::AdminService;
use crate::anchoring::AnchorHandle;
use crate::auth::Authenticator;
use crate::config::SigilConfig;
use crate::error::ServiceError;
use crate::explorer::ExplorerService;
use crate::issuance::IssuanceService;
use crate::ledger::Ledger;
use crate::store::Store;
use crate::wallet::WalletService;

pub struct AppState {
    pub config: SigilConfig,
    pub store: Arc<Store>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Ledger used by the submission endpoint.
    pub ledger: Arc<dyn Ledger>,
    pub issuance: IssuanceService,
    pub admin: AdminService,
    pub wallet: WalletService,
    pub explorer: ExplorerService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: SigilConfig,
        store: Arc<Store>,
        authenticator: Arc<dyn Authenticator>,
        ledger: Arc<dyn Ledger>,
        anchor: AnchorHandle,
    ) -> Result<Self, ServiceError> {
        let issuance = IssuanceService::new(store.clone(), &config.identity, anchor)?;
        let wallet = WalletService::new(store.clone(), issuance.factory().clone());
        Ok(Self {
            admin: AdminService::new(store.clone()),
            explorer: ExplorerService::new(store.clone()),
            issuance,
            wallet,
            config,
            store,
            authenticator,
            ledger,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
