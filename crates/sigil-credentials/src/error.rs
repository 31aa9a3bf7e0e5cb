/// Credential system errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no credentials selected")]
    EmptySelection,

    #[error("credential index {index} out of range ({available} available)")]
    InvalidSelection { index: usize, available: usize },

    #[error("{0}")]
    Validation(String),

    #[error("application is {0}, only pending applications can be reviewed")]
    NotPending(sigil_core::ApplicationStatus),

    #[error(transparent)]
    State(#[from] sigil_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
