//! One-time desktop OAuth exchange codes.

use pagespace_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `auth_exchange_codes` table.
#[derive(Debug, Clone, FromRow)]
pub struct ExchangeCode {
    pub id: DbId,
    pub code_hash: String,
    pub user_id: DbId,
    pub device_id: String,
    pub device_name: Option<String>,
    pub expires_at: Timestamp,
    pub consumed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for creating an exchange code.
#[derive(Debug, Clone)]
pub struct CreateExchangeCode {
    pub code_hash: String,
    pub user_id: DbId,
    pub device_id: String,
    pub device_name: Option<String>,
    pub expires_at: Timestamp,
}
