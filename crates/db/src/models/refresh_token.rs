//! Refresh token model, DTOs and rotation outcome.

use pagespace_core::platform::Platform;
use pagespace_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::user::User;

/// A row from the `refresh_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub device_token_id: Option<DbId>,
    pub platform: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
    /// Set when the owning device was revoked. The row stays until expiry.
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for persisting a freshly issued refresh token.
#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub device_token_id: Option<DbId>,
    pub platform: Platform,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
}

/// The replacement token written during rotation.
///
/// Device linkage and platform are inherited from the consumed row.
#[derive(Debug, Clone)]
pub struct ReplacementRefreshToken {
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
}

/// Result of [`crate::repositories::RefreshTokenRepo::rotate`].
#[derive(Debug)]
pub enum RotationOutcome {
    /// The presented token was consumed and the replacement stored.
    Rotated { user: User, consumed: RefreshToken },
    /// The token had already been used. Every session of the user was revoked.
    ReuseDetected { user_id: DbId, new_token_version: i32 },
    /// The stored token belonged to someone else or the user no longer exists.
    Invalid,
    Expired,
    /// The user was deactivated or their sessions were revoked after issue.
    Revoked,
}
