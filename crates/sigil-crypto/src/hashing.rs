use rand::RngCore;

/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 digest as lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Content identifier for pinned documents: `Qm` followed by the base58
/// BLAKE3 digest of the content.
pub fn content_id(data: &[u8]) -> String {
    format!("Qm{}", bs58::encode(hash(data)).into_string())
}

/// `len` random bytes from the OS CSPRNG, hex encoded.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash(b"sigil"), hash(b"sigil"));
        assert_ne!(hash(b"a"), hash(b"b"));
    }

    #[test]
    fn test_hash_hex_length() {
        assert_eq!(hash_hex(b"doc").len(), 64);
    }

    #[test]
    fn test_content_id_shape() {
        let cid = content_id(b"{\"id\":\"did:ion:abc\"}");
        assert!(cid.starts_with("Qm"));
        assert_eq!(cid, content_id(b"{\"id\":\"did:ion:abc\"}"));
        assert_ne!(cid, content_id(b"{}"));
    }

    #[test]
    fn test_random_hex() {
        let a = random_hex(16);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, random_hex(16));
    }
}
