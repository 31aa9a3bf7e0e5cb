//! Issuer applications and profile administration.

use std::sync::Arc;

use serde::Deserialize;
use sigil_core::{ApplicationStatus, Role};
use sigil_credentials::{IssuerApplication, Profile, ReviewDecision};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::store::Store;

/// Body of `POST /api/v1/applications/me`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    /// Organization or full name.
    #[serde(default, alias = "organizationName")]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub dns_verification: bool,
    #[serde(default)]
    pub email_verification: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

pub struct AdminService {
    store: Arc<Store>,
}

impl AdminService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn submit_application(
        &self,
        user: &CurrentUser,
        request: ApplicationRequest,
    ) -> Result<IssuerApplication, ServiceError> {
        let application = IssuerApplication::submit(
            &user.id,
            &request.full_name,
            &request.email,
            request.website_url.as_deref(),
            request.dns_verification,
            request.email_verification,
        )?;
        self.store.insert_application(&application)?;

        tracing::info!(application = %application.id, applicant = %user.id, "issuer application submitted");
        Ok(application)
    }

    pub fn my_application(&self, user: &CurrentUser) -> Result<IssuerApplication, ServiceError> {
        self.store
            .application_for_applicant(&user.id)?
            .ok_or_else(|| ServiceError::NotFound("No issuer application found".into()))
    }

    /// Delete the caller's latest application unless it was approved.
    pub fn withdraw_application(&self, user: &CurrentUser) -> Result<IssuerApplication, ServiceError> {
        let application = self.my_application(user)?;
        let withdrawn = self.store.withdraw_application(application.id)?;
        tracing::info!(application = %withdrawn.id, applicant = %user.id, "issuer application withdrawn");
        Ok(withdrawn)
    }

    /// Pending applications first, newest first within each group.
    pub fn list_applications(&self, user: &CurrentUser) -> Result<Vec<IssuerApplication>, ServiceError> {
        user.require(&[Role::Admin])?;
        let mut applications = self.store.list_applications()?;
        applications.sort_by(|a, b| {
            let a_pending = a.status == ApplicationStatus::Pending;
            let b_pending = b.status == ApplicationStatus::Pending;
            b_pending
                .cmp(&a_pending)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(applications)
    }

    pub fn review(
        &self,
        user: &CurrentUser,
        application_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<IssuerApplication, ServiceError> {
        user.require(&[Role::Admin])?;
        if self.store.get_application(application_id)?.is_none() {
            return Err(ServiceError::NotFound("Application not found".into()));
        }
        Ok(self
            .store
            .review_application(application_id, decision, &user.id)?)
    }

    pub fn list_profiles(&self, user: &CurrentUser) -> Result<Vec<Profile>, ServiceError> {
        user.require(&[Role::Admin])?;
        Ok(self.store.list_profiles()?)
    }

    pub fn set_role(
        &self,
        user: &CurrentUser,
        profile_id: &str,
        role: Role,
    ) -> Result<Profile, ServiceError> {
        user.require(&[Role::Admin])?;
        if self.store.get_profile(profile_id)?.is_none() {
            return Err(ServiceError::NotFound("Profile not found".into()));
        }
        let profile = self.store.set_role(profile_id, role)?;
        tracing::info!(profile = %profile_id, role = %role, by = %user.id, "role assigned");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(store: &Store, id: &str, role: Role) -> CurrentUser {
        let profile = store.ensure_profile(id, None, role).unwrap();
        CurrentUser {
            id: profile.id,
            email: None,
            role: profile.role,
        }
    }

    fn request() -> ApplicationRequest {
        ApplicationRequest {
            full_name: "Example University".into(),
            email: "registrar@example.edu".into(),
            website_url: Some("https://example.edu".into()),
            dns_verification: true,
            email_verification: false,
        }
    }

    #[test]
    fn test_approve_elevates_applicant() {
        let store = Arc::new(Store::memory());
        let svc = AdminService::new(store.clone());
        let applicant = user(&store, "u1", Role::Holder);
        let admin = user(&store, "admin", Role::Admin);

        let app = svc.submit_application(&applicant, request()).unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(matches!(
            svc.submit_application(&applicant, request()),
            Err(ServiceError::Conflict(_))
        ));

        let reviewed = svc.review(&admin, app.id, ReviewDecision::Approve).unwrap();
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin"));
        assert_eq!(store.get_profile("u1").unwrap().unwrap().role, Role::Issuer);

        assert!(matches!(
            svc.review(&admin, app.id, ReviewDecision::Reject),
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            svc.withdraw_application(&applicant),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn test_admin_only() {
        let store = Arc::new(Store::memory());
        let svc = AdminService::new(store.clone());
        let holder = user(&store, "u1", Role::Holder);
        let app = svc.submit_application(&holder, request()).unwrap();

        assert!(matches!(
            svc.review(&holder, app.id, ReviewDecision::Approve),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(svc.list_profiles(&holder), Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            svc.set_role(&holder, "u1", Role::Admin),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn test_validation() {
        let store = Arc::new(Store::memory());
        let svc = AdminService::new(store.clone());
        let holder = user(&store, "u1", Role::Holder);
        let err = svc
            .submit_application(&holder, ApplicationRequest::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Organization name and email are required");
    }

    #[test]
    fn test_list_pending_first() {
        let store = Arc::new(Store::memory());
        let svc = AdminService::new(store.clone());
        let admin = user(&store, "admin", Role::Admin);
        let a = user(&store, "a", Role::Holder);
        let b = user(&store, "b", Role::Holder);

        let first = svc.submit_application(&a, request()).unwrap();
        svc.review(&admin, first.id, ReviewDecision::Reject).unwrap();
        let second = svc.submit_application(&b, request()).unwrap();

        let listed = svc.list_applications(&admin).unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn test_withdraw_and_set_role() {
        let store = Arc::new(Store::memory());
        let svc = AdminService::new(store.clone());
        let admin = user(&store, "admin", Role::Admin);
        let holder = user(&store, "u1", Role::Holder);

        svc.submit_application(&holder, request()).unwrap();
        svc.withdraw_application(&holder).unwrap();
        assert!(matches!(svc.my_application(&holder), Err(ServiceError::NotFound(_))));
        svc.submit_application(&holder, request()).unwrap();

        let profile = svc.set_role(&admin, "u1", Role::Verifier).unwrap();
        assert_eq!(profile.role, Role::Verifier);
        assert!(matches!(
            svc.set_role(&admin, "ghost", Role::Issuer),
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(svc.list_profiles(&admin).unwrap().len(), 2);
    }
}
