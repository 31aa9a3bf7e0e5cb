//! Sigil Identity Layer
//!
//! Decentralised identity primitives for the Sigil node:
//! - DID identifier generation and W3C DID document assembly
//! - Persisted records for DIDs, anchoring operations, pins, verifications
//!   and anchoring jobs
//! - Create-operation payloads submitted to the anchoring ledger

pub mod did;
pub mod document;
pub mod error;
pub mod operation;
pub mod records;

pub use did::DidFactory;
pub use document::{DidDocument, Service, VerificationMethod};
pub use error::IdentityError;
pub use operation::{create_operation_payload, LedgerReceipt};
pub use records::{
    AnchorJob, AnchorOperation, CheckResult, Checks, DidRecord, PinRecord, VerificationRecord,
};
