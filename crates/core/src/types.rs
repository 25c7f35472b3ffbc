//! Shared scalar aliases for ids and timestamps.

/// Row id of `users`, `device_tokens`, `refresh_tokens` and friends
/// (`BIGSERIAL` in Postgres).
pub type DbId = i64;

/// Token expiries, lockouts and rate-limit windows are all UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
