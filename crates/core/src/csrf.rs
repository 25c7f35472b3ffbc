//! Signed, session-bound CSRF tokens.
//!
//! Token format: `<random hex>.<issued unix ts>.<hex hmac>`, where the HMAC
//! covers `<session id>.<random>.<ts>`. A token is only valid for the session
//! it was minted for and only until it reaches its maximum age.

use crate::hashing::{hmac_sha256_hex, random_hex, sha256_hex, verify_hmac_sha256_hex};
use crate::types::DbId;

/// Lifetime of a session CSRF token.
pub const CSRF_MAX_AGE_SECS: i64 = 3600;

/// Lifetime of a pre-login (double-submit) CSRF token.
pub const LOGIN_CSRF_MAX_AGE_SECS: i64 = 300;

/// Pseudo session id that login CSRF tokens are bound to.
pub const LOGIN_CSRF_SESSION: &str = "login";

/// Allowed clock skew for tokens stamped slightly in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Why a CSRF token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    #[error("CSRF token is malformed")]
    Malformed,
    #[error("CSRF token has expired")]
    Expired,
    #[error("CSRF token signature is invalid")]
    BadSignature,
}

/// Derive the session id a CSRF token is bound to.
///
/// Bound to the user and their token version, so a token survives access
/// token refreshes but dies with any session revocation.
pub fn session_id_for(user_id: DbId, token_version: i32) -> String {
    sha256_hex(format!("{user_id}:{token_version}").as_bytes())
}

/// Mint a CSRF token for `session_id`, stamped with `now` (unix seconds).
pub fn generate_csrf_token(secret: &[u8], session_id: &str, now: i64) -> String {
    let nonce = random_hex(16);
    let signature = hmac_sha256_hex(secret, signing_input(session_id, &nonce, now).as_bytes());
    format!("{nonce}.{now}.{signature}")
}

/// Validate a CSRF token against `session_id` at time `now`.
pub fn validate_csrf_token(
    secret: &[u8],
    token: &str,
    session_id: &str,
    max_age_secs: i64,
    now: i64,
) -> Result<(), CsrfError> {
    let mut parts = token.split('.');
    let (Some(nonce), Some(ts), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CsrfError::Malformed);
    };
    if nonce.is_empty() || signature.is_empty() {
        return Err(CsrfError::Malformed);
    }
    let issued_at: i64 = ts.parse().map_err(|_| CsrfError::Malformed)?;

    if !verify_hmac_sha256_hex(
        secret,
        signing_input(session_id, nonce, issued_at).as_bytes(),
        signature,
    ) {
        return Err(CsrfError::BadSignature);
    }

    if issued_at > now + MAX_CLOCK_SKEW_SECS || now - issued_at > max_age_secs {
        return Err(CsrfError::Expired);
    }
    Ok(())
}

fn signing_input(session_id: &str, nonce: &str, issued_at: i64) -> String {
    format!("{session_id}.{nonce}.{issued_at}")
}
