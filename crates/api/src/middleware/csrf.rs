//! CSRF checks.
//!
//! Two schemes are used:
//!
//! - Session tokens: `GET /auth/csrf` mints a token bound to the user's
//!   session. Cookie-authenticated unsafe requests must echo it in
//!   `x-csrf-token`. Enforced by [`crate::middleware::auth::AuthUser`].
//! - Login tokens: before a session exists, `GET /auth/login-csrf` sets a
//!   signed `login_csrf` cookie and returns the same value. Web login and
//!   signup must echo it in `x-login-csrf-token` (double submit).

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use pagespace_core::csrf::{
    session_id_for, validate_csrf_token, CSRF_MAX_AGE_SECS, LOGIN_CSRF_MAX_AGE_SECS,
    LOGIN_CSRF_SESSION,
};
use pagespace_core::types::DbId;

use crate::auth::cookies::LOGIN_CSRF_COOKIE;
use crate::error::{AppError, AppResult};

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const LOGIN_CSRF_HEADER: &str = "x-login-csrf-token";

/// Validate the session CSRF header for `(user_id, token_version)`.
pub fn verify_session_csrf(
    headers: &HeaderMap,
    secret: &str,
    user_id: DbId,
    token_version: i32,
) -> AppResult<()> {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::CsrfInvalid("Missing CSRF token".into()))?;

    validate_csrf_token(
        secret.as_bytes(),
        token,
        &session_id_for(user_id, token_version),
        CSRF_MAX_AGE_SECS,
        Utc::now().timestamp(),
    )
    .map_err(|e| AppError::CsrfInvalid(e.to_string()))
}

/// Validate the login double-submit pair: header and cookie must match and
/// carry a valid signature.
pub fn verify_login_csrf(jar: &CookieJar, headers: &HeaderMap, secret: &str) -> AppResult<()> {
    let header = headers
        .get(LOGIN_CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::CsrfInvalid("Missing login CSRF token".into()))?;
    let cookie = jar
        .get(LOGIN_CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::CsrfInvalid("Missing login CSRF cookie".into()))?;

    if header != cookie {
        return Err(AppError::CsrfInvalid("Login CSRF token mismatch".into()));
    }

    validate_csrf_token(
        secret.as_bytes(),
        header,
        LOGIN_CSRF_SESSION,
        LOGIN_CSRF_MAX_AGE_SECS,
        Utc::now().timestamp(),
    )
    .map_err(|e| AppError::CsrfInvalid(e.to_string()))
}
