//! Error types for the storage layer and the service boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sigil_credentials::CredentialError;
use sigil_identity::IdentityError;

/// Errors raised by the typed store and its backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A lifecycle rule rejected the write.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<IdentityError> for StoreError {
    fn from(e: IdentityError) -> Self {
        StoreError::InvalidState(e.to_string())
    }
}

impl From<CredentialError> for StoreError {
    fn from(e: CredentialError) -> Self {
        StoreError::InvalidState(e.to_string())
    }
}

/// Errors returned to API callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    InvalidState(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            // Duplicate DIDs are reported as 400.
            ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidState(_) => StatusCode::CONFLICT,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::InvalidState(msg) => ServiceError::InvalidState(msg),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotPending(_) | CredentialError::State(_) => {
                ServiceError::InvalidState(e.to_string())
            }
            CredentialError::Serialization(_) => ServiceError::Storage(e.to_string()),
            _ => ServiceError::Validation(e.to_string()),
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidDid(_) | IdentityError::InvalidPublicKey(_) => {
                ServiceError::Validation(e.to_string())
            }
            IdentityError::State(_) => ServiceError::InvalidState(e.to_string()),
            _ => ServiceError::Storage(e.to_string()),
        }
    }
}
