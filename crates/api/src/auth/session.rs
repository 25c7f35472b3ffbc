//! Issuing sessions.
//!
//! A session is an access token, a stored refresh token and a CSRF token.
//! Native clients that identify their device also get a device token, which
//! outlives refresh tokens and lets the app sign back in without a password.

use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use pagespace_core::csrf::{generate_csrf_token, session_id_for};
use pagespace_core::platform::Platform;
use pagespace_core::types::DbId;
use pagespace_db::models::device_token::CreateDeviceToken;
use pagespace_db::models::refresh_token::CreateRefreshToken;
use pagespace_db::models::user::{User, UserResponse};
use pagespace_db::repositories::{DeviceTokenRepo, RefreshTokenRepo};
use serde::Serialize;

use super::cookies::with_session_cookies;
use super::device::generate_device_token;
use super::jwt::{generate_access_token, generate_refresh_token};
use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

/// What the caller knows about the client a session is for.
#[derive(Debug, Clone)]
pub struct SessionRequest<'a> {
    pub platform: Platform,
    pub device_id: Option<&'a str>,
    pub device_name: Option<&'a str>,
    /// Bind to this live device token instead of issuing a new one.
    pub existing_device_token_id: Option<DbId>,
    pub client: &'a ClientInfo,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Plaintext device token, only when a new one was issued.
    pub device_token: Option<String>,
    pub csrf_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Successful authentication response.
///
/// Web clients receive tokens as cookies only, so the token fields are
/// omitted from the body for them.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub csrf_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    pub expires_in: i64,
}

/// Mint and persist a new session for `user`.
pub async fn issue_session(
    state: &AppState,
    user: &User,
    request: &SessionRequest<'_>,
) -> AppResult<IssuedSession> {
    let config = &state.config;
    let platform = request.platform;

    let mut device_token = None;
    let device_token_id = match (request.existing_device_token_id, request.device_id) {
        (Some(id), _) => Some(id),
        (None, Some(device_id)) if platform.is_native() => {
            let (token, hash) = generate_device_token();
            let row = DeviceTokenRepo::issue(
                &state.pool,
                &CreateDeviceToken {
                    user_id: user.id,
                    token_hash: hash,
                    device_id: device_id.to_string(),
                    platform,
                    device_name: request.device_name.map(str::to_string),
                    user_agent: request.client.user_agent.clone(),
                    ip_address: request.client.ip_address(),
                    token_version: user.token_version,
                    expires_at: Utc::now() + Duration::days(config.auth.device_token_expiry_days),
                },
            )
            .await?;
            device_token = Some(token);
            Some(row.id)
        }
        _ => None,
    };

    let access_token =
        generate_access_token(user.id, user.token_version, &user.role, platform, &config.jwt)
            .map_err(token_error)?;
    let refresh =
        generate_refresh_token(user.id, user.token_version, &user.role, platform, &config.jwt)
            .map_err(token_error)?;

    RefreshTokenRepo::create(
        &state.pool,
        &CreateRefreshToken {
            user_id: user.id,
            token_hash: refresh.hash,
            device_token_id,
            platform,
            user_agent: request.client.user_agent.clone(),
            ip_address: request.client.ip_address(),
            expires_at: refresh.expires_at,
        },
    )
    .await?;

    tracing::info!(
        user_id = user.id,
        platform = %platform,
        device_token_id,
        "Issued session"
    );

    Ok(IssuedSession {
        access_token,
        refresh_token: refresh.token,
        device_token,
        csrf_token: csrf_token_for(user, config),
        expires_in: config.jwt.access_token_expiry_mins * 60,
    })
}

/// Deliver a session: cookies for web, response body for native clients.
pub fn deliver_session(
    jar: CookieJar,
    session: IssuedSession,
    user: &User,
    platform: Platform,
    config: &ServerConfig,
) -> (CookieJar, Json<AuthResponse>) {
    if platform.is_native() {
        let body = AuthResponse {
            user: UserResponse::from(user),
            csrf_token: session.csrf_token,
            access_token: Some(session.access_token),
            refresh_token: Some(session.refresh_token),
            device_token: session.device_token,
            expires_in: session.expires_in,
        };
        (jar, Json(body))
    } else {
        let jar = with_session_cookies(jar, &session.access_token, &session.refresh_token, config);
        let body = AuthResponse {
            user: UserResponse::from(user),
            csrf_token: session.csrf_token,
            access_token: None,
            refresh_token: None,
            device_token: None,
            expires_in: session.expires_in,
        };
        (jar, Json(body))
    }
}

/// A session CSRF token for the user's current token version.
pub fn csrf_token_for(user: &User, config: &ServerConfig) -> String {
    generate_csrf_token(
        config.auth.csrf_secret.as_bytes(),
        &session_id_for(user.id, user.token_version),
        Utc::now().timestamp(),
    )
}

pub fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::InternalError(format!("Token generation error: {e}"))
}
