//! User entity model and DTOs.

use pagespace_core::platform::AuthProvider;
use pagespace_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub apple_id: Option<String>,
    pub provider: String,
    pub image: Option<String>,
    pub email_verified_at: Option<Timestamp>,
    pub role: String,
    pub token_version: i32,
    pub is_active: bool,
    pub failed_login_count: i32,
    pub locked_until: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub tos_accepted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// `true` while a lockout is in effect.
    pub fn is_locked(&self, now: Timestamp) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Safe user representation for API responses (no secrets).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub provider: String,
    pub role: String,
    pub email_verified: bool,
    pub has_password: bool,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
            provider: user.provider.clone(),
            role: user.role.clone(),
            email_verified: user.email_verified_at.is_some(),
            has_password: user.password_hash.is_some(),
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
///
/// `email` must already be normalized (see `pagespace_core::validation::normalize_email`).
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub provider: AuthProvider,
    pub google_id: Option<String>,
    pub apple_id: Option<String>,
    pub image: Option<String>,
    pub email_verified: bool,
    pub tos_accepted: bool,
}
