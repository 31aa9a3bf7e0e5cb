//! Sigil node internals: storage, anchoring worker, domain services and the
//! HTTP API.

pub mod admin;
pub mod anchoring;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod explorer;
pub mod issuance;
pub mod ledger;
pub mod node;
pub mod state;
pub mod storage;
pub mod store;
pub mod wallet;

pub use auth::{AuthUser, Authenticator, StaticAuthenticator};
pub use config::SigilConfig;
pub use error::{ServiceError, StoreError};
pub use ledger::{Ledger, SimulatedLedger};
pub use node::SigilNode;
pub use store::Store;
