use serde::{Deserialize, Serialize};
use sigil_core::Did;
use sigil_crypto::PublicKey;

use crate::error::IdentityError;

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const KEY_TYPE: &str = "Ed25519VerificationKey2020";
pub const SERVICE_TYPE: &str = "LinkedDomains";

/// A verification method within a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Verification method identifier (e.g., "did:ion:abc#key-1").
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    /// `z` followed by the hex encoded key.
    pub public_key_multibase: String,
}

/// A service endpoint in a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: String,
}

/// W3C DID Document as published for a Sigil DID.
///
/// Field order is fixed so that the serialized form is stable; its bytes
/// feed the content identifier of the pinned document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    pub verification_method: Vec<VerificationMethod>,
    pub authentication: Vec<String>,
    pub assertion_method: Vec<String>,
    /// Omitted entirely when there are no services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

impl DidDocument {
    /// Create a document with a single Ed25519 key referenced by both
    /// `authentication` and `assertionMethod`.
    pub fn new(did: &Did, public_key: &PublicKey) -> Self {
        let key_id = did.fragment("key-1");
        Self {
            context: vec![DID_CONTEXT.to_string()],
            id: did.uri().to_string(),
            verification_method: vec![VerificationMethod {
                id: key_id.clone(),
                method_type: KEY_TYPE.to_string(),
                controller: did.uri().to_string(),
                public_key_multibase: public_key.to_multibase(),
            }],
            authentication: vec![key_id.clone()],
            assertion_method: vec![key_id],
            service: Vec::new(),
        }
    }

    /// Add a `LinkedDomains` service endpoint.
    pub fn add_service(&mut self, endpoint: &str) {
        let idx = self.service.len() + 1;
        self.service.push(Service {
            id: format!("{}#service-{}", self.id, idx),
            service_type: SERVICE_TYPE.to_string(),
            service_endpoint: endpoint.to_string(),
        });
    }

    /// Multibase key of the first verification method.
    pub fn primary_key_multibase(&self) -> Option<&str> {
        self.verification_method
            .first()
            .map(|vm| vm.public_key_multibase.as_str())
    }

    /// Serialized bytes used for hashing.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, IdentityError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_crypto::KeyPair;

    fn sample() -> (Did, PublicKey, DidDocument) {
        let did = Did::from_parts("ion", "00112233445566778899aabbccddeeff");
        let pk = KeyPair::generate().public_key();
        let doc = DidDocument::new(&did, &pk);
        (did, pk, doc)
    }

    #[test]
    fn test_create_did_document() {
        let (did, pk, doc) = sample();
        assert_eq!(doc.id, did.uri());
        assert_eq!(doc.context, vec![DID_CONTEXT.to_string()]);
        assert_eq!(doc.verification_method.len(), 1);
        let vm = &doc.verification_method[0];
        assert_eq!(vm.id, format!("{}#key-1", did));
        assert_eq!(vm.method_type, KEY_TYPE);
        assert_eq!(vm.controller, did.uri());
        assert_eq!(vm.public_key_multibase, format!("z{}", pk.to_hex()));
        assert_eq!(doc.authentication, vec![vm.id.clone()]);
        assert_eq!(doc.assertion_method, vec![vm.id.clone()]);
    }

    #[test]
    fn test_service_key_omitted_when_empty() {
        let (_, _, doc) = sample();
        let json = doc.to_value().unwrap();
        assert!(json.get("service").is_none());
        assert!(json.get("@context").is_some());
        assert!(json.get("verificationMethod").is_some());
        assert_eq!(
            json["verificationMethod"][0]["type"],
            "Ed25519VerificationKey2020"
        );
    }

    #[test]
    fn test_add_service() {
        let (did, _, mut doc) = sample();
        doc.add_service("https://example.org");
        let json = doc.to_value().unwrap();
        assert_eq!(json["service"][0]["id"], format!("{}#service-1", did));
        assert_eq!(json["service"][0]["type"], "LinkedDomains");
        assert_eq!(json["service"][0]["serviceEndpoint"], "https://example.org");
    }

    #[test]
    fn test_json_roundtrip_preserves_bytes() {
        let (_, _, doc) = sample();
        let bytes = doc.canonical_bytes().unwrap();
        let back: DidDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.canonical_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_primary_key() {
        let (_, pk, doc) = sample();
        assert_eq!(doc.primary_key_multibase(), Some(pk.to_multibase().as_str()));
    }
}
