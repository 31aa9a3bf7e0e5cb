/// Identity-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error(transparent)]
    State(#[from] sigil_core::CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] sigil_crypto::CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
