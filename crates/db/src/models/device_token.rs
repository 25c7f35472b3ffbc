//! Device token model and DTOs.

use pagespace_core::platform::Platform;
use pagespace_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Revocation reasons recorded in `device_tokens.revoked_reason`.
pub mod revoke_reason {
    pub const LOGOUT: &str = "logout";
    pub const REPLACED: &str = "replaced";
    pub const ROTATED: &str = "rotated";
    pub const USER_REVOKED: &str = "user_revoked";
    pub const SESSIONS_REVOKED: &str = "sessions_revoked";
    pub const TOKEN_REUSE: &str = "token_reuse";
}

/// A row from the `device_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub device_id: String,
    pub platform: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub token_version: i32,
    pub last_used_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub revoked_reason: Option<String>,
    pub created_at: Timestamp,
}

/// Device listing entry for the account devices page (no token hash).
#[derive(Debug, Clone, Serialize)]
pub struct DeviceResponse {
    pub id: DbId,
    pub device_id: String,
    pub platform: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_used_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl From<&DeviceToken> for DeviceResponse {
    fn from(token: &DeviceToken) -> Self {
        Self {
            id: token.id,
            device_id: token.device_id.clone(),
            platform: token.platform.clone(),
            device_name: token.device_name.clone(),
            user_agent: token.user_agent.clone(),
            ip_address: token.ip_address.clone(),
            last_used_at: token.last_used_at,
            expires_at: token.expires_at,
            created_at: token.created_at,
        }
    }
}

/// DTO for issuing a device token.
#[derive(Debug, Clone)]
pub struct CreateDeviceToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub device_id: String,
    pub platform: Platform,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub token_version: i32,
    pub expires_at: Timestamp,
}
