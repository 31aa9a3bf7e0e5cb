//! Sigil Credentials: credential documents, presentation assembly and
//! verification, user profiles and issuer applications.

pub mod application;
pub mod credential;
pub mod error;
pub mod presentation;
pub mod profile;
pub mod verifier;

pub use application::{IssuerApplication, ReviewDecision};
pub use credential::{CredentialBuilder, StoredCredential};
pub use error::CredentialError;
pub use presentation::{PresentationBuilder, PresentationProof, VerifiablePresentation};
pub use profile::Profile;
pub use verifier::{CredentialSummary, PresentationVerifier, VerificationReport};
