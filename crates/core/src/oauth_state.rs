//! HMAC-signed OAuth `state` parameter.
//!
//! The state round-trips through the identity provider, so it carries the
//! platform, device and return URL of the login attempt instead of keeping
//! them server-side. Format: `<base64url(json)>.<hex hmac>`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::hashing::{hmac_sha256_hex, random_hex, verify_hmac_sha256_hex};
use crate::platform::Platform;

/// Maximum age of a state parameter (covers the user's time on the consent screen).
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthStatePayload {
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub return_url: String,
    /// Random value so two states with identical fields differ.
    pub nonce: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
}

impl OAuthStatePayload {
    pub fn new(
        platform: Platform,
        device_id: Option<String>,
        device_name: Option<String>,
        return_url: String,
        now: i64,
    ) -> Self {
        Self {
            platform,
            device_id,
            device_name,
            return_url,
            nonce: random_hex(8),
            iat: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OAuthStateError {
    #[error("OAuth state is malformed")]
    Malformed,
    #[error("OAuth state signature is invalid")]
    BadSignature,
    #[error("OAuth state has expired")]
    Expired,
}

/// Serialize and sign a state payload.
pub fn encode_state(secret: &[u8], payload: &OAuthStatePayload) -> String {
    let json = serde_json::to_vec(payload).expect("state payload is always serializable");
    let body = URL_SAFE_NO_PAD.encode(json);
    let signature = hmac_sha256_hex(secret, body.as_bytes());
    format!("{body}.{signature}")
}

/// Verify and decode a state parameter received on a callback.
pub fn decode_state(
    secret: &[u8],
    state: &str,
    now: i64,
) -> Result<OAuthStatePayload, OAuthStateError> {
    let (body, signature) = state.split_once('.').ok_or(OAuthStateError::Malformed)?;
    if !verify_hmac_sha256_hex(secret, body.as_bytes(), signature) {
        return Err(OAuthStateError::BadSignature);
    }
    let json = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| OAuthStateError::Malformed)?;
    let payload: OAuthStatePayload =
        serde_json::from_slice(&json).map_err(|_| OAuthStateError::Malformed)?;

    if now - payload.iat > OAUTH_STATE_MAX_AGE_SECS || payload.iat > now + 60 {
        return Err(OAuthStateError::Expired);
    }
    Ok(payload)
}
