use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigil_core::ApplicationStatus;
use uuid::Uuid;

use crate::error::CredentialError;

/// Admin decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Request by a user to become a credential issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerApplication {
    pub id: Uuid,
    pub applicant_id: String,
    /// Organization or full name.
    pub full_name: String,
    pub email: String,
    pub website_url: Option<String>,
    pub dns_verification: bool,
    pub email_verification: bool,
    pub status: ApplicationStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuerApplication {
    /// Validate the form fields and create a `pending` application.
    pub fn submit(
        applicant_id: &str,
        full_name: &str,
        email: &str,
        website_url: Option<&str>,
        dns_verification: bool,
        email_verification: bool,
    ) -> Result<Self, CredentialError> {
        let full_name = full_name.trim();
        let email = email.trim();
        if full_name.is_empty() || email.is_empty() {
            return Err(CredentialError::Validation(
                "Organization name and email are required".into(),
            ));
        }
        if !email.contains('@') {
            return Err(CredentialError::Validation(format!(
                "invalid email address: {}",
                email
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            applicant_id: applicant_id.to_string(),
            full_name: full_name.to_string(),
            email: email.to_lowercase(),
            website_url: website_url
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
            dns_verification,
            email_verification,
            status: ApplicationStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record an admin decision. Only pending applications can be reviewed.
    pub fn review(&mut self, decision: ReviewDecision, reviewer: &str) -> Result<(), CredentialError> {
        if self.status != ApplicationStatus::Pending {
            return Err(CredentialError::NotPending(self.status));
        }
        let now = Utc::now();
        self.status = match decision {
            ReviewDecision::Approve => ApplicationStatus::Approved,
            ReviewDecision::Reject => ApplicationStatus::Rejected,
        };
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(now);
        self.updated_at = now;

        tracing::info!(
            application = %self.id,
            applicant = %self.applicant_id,
            status = %self.status,
            "issuer application reviewed"
        );
        Ok(())
    }
}
