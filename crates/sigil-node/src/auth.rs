//! Bearer-token authentication and per-request session capability.
//!
//! Credential checking is delegated to an identity provider; the node only
//! maps a token to a user id and loads (or creates) that user's profile.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sigil_core::Role;

use crate::config::AuthConfig;
use crate::error::ServiceError;
use crate::state::AppState;

/// Identity asserted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Map a bearer token to a user, or `Unauthorized`.
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError>;
}

/// Build the authenticator selected in config: the provider when a URL is
/// set, otherwise the static token table.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn Authenticator>, ServiceError> {
    match config.provider_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpAuthenticator::new(
            url,
            config.provider_api_key.clone(),
            Duration::from_millis(config.provider_timeout_ms),
        )?)),
        None => {
            let auth = StaticAuthenticator::new();
            for t in &config.static_tokens {
                auth.insert(
                    &t.token,
                    AuthUser {
                        id: t.user_id.clone(),
                        email: t.email.clone(),
                    },
                );
            }
            Ok(Arc::new(auth))
        }
    }
}

/// Fixed token table.
#[derive(Default)]
pub struct StaticAuthenticator {
    tokens: DashMap<String, AuthUser>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, user: AuthUser) {
        self.tokens.insert(token.to_string(), user);
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        self.tokens
            .get(token)
            .map(|u| u.value().clone())
            .ok_or_else(|| ServiceError::Unauthorized("Invalid authentication token".into()))
    }
}

/// Checks tokens against `<provider>/auth/v1/user`.
pub struct HttpAuthenticator {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpAuthenticator {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ExternalService(format!("identity provider client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let mut req = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::ExternalService("identity provider did not respond in time".into())
            } else {
                ServiceError::ExternalService(format!("identity provider unreachable: {}", e))
            }
        })?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "token rejected by identity provider");
            return Err(ServiceError::Unauthorized("Invalid authentication token".into()));
        }

        resp.json::<AuthUser>()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("invalid identity provider reply: {}", e)))
    }
}

/// The authenticated caller and their profile role.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl CurrentUser {
    /// `Forbidden` unless the caller holds one of `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ServiceError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Insufficient permissions".into()))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;
        let user = state.authenticator.authenticate(token).await?;

        let default_role = if state.config.auth.bootstrap_admins.contains(&user.id) {
            Role::Admin
        } else {
            Role::Holder
        };
        let profile = state
            .store
            .ensure_profile(&user.id, user.email.as_deref(), default_role)?;

        Ok(CurrentUser {
            id: profile.id,
            email: profile.email.or(user.email),
            role: profile.role,
        })
    }
}
