//! Sigil Core: Fundamental types, errors, and lifecycle state machines for
//! the Sigil identity node.

pub mod credential_state;
pub mod did_state;
pub mod error;
pub mod job_state;
pub mod types;

pub use credential_state::{CredentialEvent, CredentialStateMachine};
pub use did_state::{DidEvent, DidStateMachine};
pub use error::CoreError;
pub use job_state::{JobEvent, JobStateMachine};
pub use types::{
    ApplicationStatus, CredentialStatus, Did, DidStatus, JobState, OperationType, Role,
    VerificationStatus,
};
