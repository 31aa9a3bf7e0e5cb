use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

const NONCE_LEN: usize = 12;
const KEY_CONTEXT: &str = "sigil private-key envelope v1";

/// Node-wide key that seals generated private keys at rest.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Parse a 32-byte key given as 64 hex characters.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str.trim())
                .map_err(|e| CryptoError::InvalidInput(format!("invalid master key hex: {}", e)))?,
        );
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    /// Fresh random master key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, CryptoError> {
        let derived = Zeroizing::new(blake3::derive_key(KEY_CONTEXT, &self.0));
        ChaCha20Poly1305::new_from_slice(&derived[..])
            .map_err(|e| CryptoError::EncryptionError(format!("cipher init failed: {}", e)))
    }

    /// Seal secret bytes. The envelope is `nonce (12) || ciphertext+tag`, hex encoded.
    pub fn seal(&self, secret: &[u8]) -> Result<SealedKey, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), secret)
            .map_err(|e| CryptoError::EncryptionError(format!("encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(SealedKey(hex::encode(out)))
    }

    /// Open an envelope produced by [`MasterKey::seal`].
    pub fn open(&self, sealed: &SealedKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let bytes = hex::decode(&sealed.0)
            .map_err(|e| CryptoError::DecryptionError(format!("invalid envelope hex: {}", e)))?;
        if bytes.len() <= NONCE_LEN {
            return Err(CryptoError::DecryptionError("envelope too short".into()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::DecryptionError(format!("decryption failed: {}", e)))?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Hex-encoded sealed private key as persisted on a DID record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey(String);

impl SealedKey {
    pub fn from_hex(hex_str: impl Into<String>) -> Self {
        Self(hex_str.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
