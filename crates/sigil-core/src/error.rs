use crate::types::{CredentialStatus, DidStatus, JobState};

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid DID transition from {from} to {to}")]
    InvalidDidTransition { from: DidStatus, to: DidStatus },

    #[error("invalid job transition from {from} to {to}")]
    InvalidJobTransition { from: JobState, to: JobState },

    #[error("invalid credential transition from {from} to {to}")]
    InvalidCredentialTransition {
        from: CredentialStatus,
        to: CredentialStatus,
    },

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
