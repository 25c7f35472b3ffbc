//! Opaque device tokens and desktop exchange codes.
//!
//! Device tokens are long-lived credentials held by desktop and mobile apps.
//! They are never JWTs: the server only stores their SHA-256 hash.

use chrono::Duration;
use pagespace_core::hashing::{random_alphanumeric, sha256_hex};
use pagespace_core::types::Timestamp;

pub const DEVICE_TOKEN_PREFIX: &str = "dev_";
const DEVICE_TOKEN_RANDOM_LEN: usize = 48;

/// Device tokens closer than this to expiry are replaced on refresh.
pub const DEVICE_TOKEN_ROTATION_WINDOW_DAYS: i64 = 30;

/// Lifetime of a desktop exchange code.
pub const EXCHANGE_CODE_TTL_SECS: i64 = 300;
const EXCHANGE_CODE_LEN: usize = 43;

/// Generate a device token. Returns `(plaintext, sha256_hex_hash)`.
pub fn generate_device_token() -> (String, String) {
    let token = format!(
        "{DEVICE_TOKEN_PREFIX}{}",
        random_alphanumeric(DEVICE_TOKEN_RANDOM_LEN)
    );
    let hash = hash_device_token(&token);
    (token, hash)
}

pub fn hash_device_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

/// `true` when a token expiring at `expires_at` should be rotated at `now`.
pub fn needs_rotation(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at - now < Duration::days(DEVICE_TOKEN_ROTATION_WINDOW_DAYS)
}

/// Generate a one-time exchange code. Returns `(plaintext, sha256_hex_hash)`.
pub fn generate_exchange_code() -> (String, String) {
    let code = random_alphanumeric(EXCHANGE_CODE_LEN);
    let hash = sha256_hex(code.as_bytes());
    (code, hash)
}

pub fn hash_exchange_code(code: &str) -> String {
    sha256_hex(code.as_bytes())
}
