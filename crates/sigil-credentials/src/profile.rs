use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigil_core::Role;

/// A user profile. `id` is the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Profile created on first sign-in.
    pub fn first_sign_in(id: &str, email: Option<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            email: email.map(|e| e.trim().to_lowercase()),
            full_name: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_role(&mut self, role: Role) {
        if self.role != role {
            tracing::info!(profile = %self.id, from = %self.role, to = %role, "role changed");
        }
        self.role = role;
        self.updated_at = Utc::now();
    }
}
