use sigil_core::Did;
use sigil_crypto::{random_hex, PublicKey};

use crate::document::DidDocument;
use crate::error::IdentityError;

/// Mints DID identifiers and assembles their documents for one DID method.
#[derive(Debug, Clone)]
pub struct DidFactory {
    method: String,
}

impl DidFactory {
    pub fn new(method: &str) -> Result<Self, IdentityError> {
        Did::new(format!("did:{}:check", method))
            .map_err(|e| IdentityError::InvalidDid(e.to_string()))?;
        Ok(Self {
            method: method.to_string(),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// New identifier `did:<method>:<32 hex chars>` from 16 CSPRNG bytes.
    pub fn generate_identifier(&self) -> Did {
        Did::from_parts(&self.method, &random_hex(16))
    }

    /// Generate an identifier and build its document.
    ///
    /// A `LinkedDomains` service is added only when `include_service` is set
    /// and the endpoint is non-empty after trimming.
    pub fn assemble(
        &self,
        public_key: &PublicKey,
        include_service: bool,
        service_endpoint: Option<&str>,
    ) -> (Did, DidDocument) {
        let did = self.generate_identifier();
        let mut doc = DidDocument::new(&did, public_key);
        if let Some(endpoint) = effective_service_endpoint(include_service, service_endpoint) {
            doc.add_service(endpoint);
        }

        tracing::debug!(did = %did, services = doc.service.len(), "DID document assembled");
        (did, doc)
    }

    /// Issuer identifier used on credentials: `did:<method>:issuer:<user id>`.
    pub fn issuer_did(&self, user_id: &str) -> String {
        format!("did:{}:issuer:{}", self.method, user_id)
    }

    /// Subject identifier for a recipient without a DID of their own.
    pub fn holder_did(&self, email: &str) -> String {
        format!("did:{}:holder:{}", self.method, email)
    }
}

fn effective_service_endpoint(include: bool, endpoint: Option<&str>) -> Option<&str> {
    if !include {
        return None;
    }
    endpoint.map(str::trim).filter(|e| !e.is_empty())
}
