use serde::{Deserialize, Serialize};
use serde_json::json;
use sigil_core::{Did, OperationType};
use sigil_crypto::hash_hex;

use crate::document::DidDocument;
use crate::error::IdentityError;

/// Confirmation returned by the ledger for an anchored operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub transaction_id: String,
    pub block_height: u64,
}

/// Build the payload of a `create` operation for `did`.
///
/// The delta carries the full document as a single `replace` patch. The
/// commitments are BLAKE3 digests bound to the DID suffix.
pub fn create_operation_payload(
    did: &Did,
    document: &DidDocument,
) -> Result<serde_json::Value, IdentityError> {
    let suffix = did.suffix();
    let delta_hash = hash_hex(&document.canonical_bytes()?);
    let recovery_commitment = hash_hex(format!("recovery:{}", suffix).as_bytes());
    let update_commitment = hash_hex(format!("update:{}", suffix).as_bytes());

    Ok(json!({
        "type": OperationType::Create.as_str(),
        "suffixData": {
            "deltaHash": delta_hash,
            "recoveryCommitment": recovery_commitment,
        },
        "delta": {
            "updateCommitment": update_commitment,
            "patches": [{
                "action": "replace",
                "document": document.to_value()?,
            }],
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_crypto::KeyPair;

    #[test]
    fn test_create_payload_shape() {
        let did = Did::from_parts("ion", "abcdef");
        let doc = DidDocument::new(&did, &KeyPair::generate().public_key());
        let payload = create_operation_payload(&did, &doc).unwrap();

        assert_eq!(payload["type"], "create");
        assert_eq!(payload["delta"]["patches"][0]["action"], "replace");
        assert_eq!(payload["delta"]["patches"][0]["document"]["id"], did.uri());
        assert_eq!(
            payload["suffixData"]["deltaHash"],
            hash_hex(&doc.canonical_bytes().unwrap())
        );
    }

    #[test]
    fn test_commitments_bound_to_suffix() {
        let pk = KeyPair::generate().public_key();
        let a = Did::from_parts("ion", "aaaa");
        let b = Did::from_parts("ion", "bbbb");
        let pa = create_operation_payload(&a, &DidDocument::new(&a, &pk)).unwrap();
        let pb = create_operation_payload(&b, &DidDocument::new(&b, &pk)).unwrap();
        assert_ne!(
            pa["suffixData"]["recoveryCommitment"],
            pb["suffixData"]["recoveryCommitment"]
        );
        assert_ne!(pa["delta"]["updateCommitment"], pb["delta"]["updateCommitment"]);
    }

    #[test]
    fn test_receipt_serializes_camel_case() {
        let receipt = LedgerReceipt {
            transaction_id: "btc_tx_00".into(),
            block_height: 812_345,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["transactionId"], "btc_tx_00");
        assert_eq!(json["blockHeight"], 812_345);
    }
}
