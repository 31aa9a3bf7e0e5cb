//! Sigil Crypto: key generation, private key sealing and content hashing.

pub mod envelope;
pub mod error;
pub mod hashing;
pub mod keys;

pub use envelope::{MasterKey, SealedKey};
pub use error::CryptoError;
pub use hashing::{content_id, hash, hash_hex, random_hex};
pub use keys::{KeyPair, PublicKey};
