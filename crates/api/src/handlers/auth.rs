//! Handlers for the `/auth` resource (signup, login, refresh, logout,
//! session management).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use pagespace_core::csrf::{generate_csrf_token, LOGIN_CSRF_SESSION};
use pagespace_core::error::CoreError;
use pagespace_core::platform::{AuthProvider, Platform};
use pagespace_core::rate_limit::{LOGIN, PASSWORD_CHANGE, REFRESH, SIGNUP};
use pagespace_core::validation::{
    normalize_email, validate_device_id, validate_email, validate_name,
    validate_password_strength,
};
use pagespace_db::models::device_token::revoke_reason;
use pagespace_db::models::refresh_token::{ReplacementRefreshToken, RotationOutcome};
use pagespace_db::models::user::{CreateUser, User, UserResponse};
use pagespace_db::repositories::{DeviceTokenRepo, RefreshTokenRepo, SessionRepo, UserRepo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{
    with_login_csrf_cookie, without_session_cookies, REFRESH_TOKEN_COOKIE,
};
use crate::auth::device::hash_device_token;
use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, hash_refresh_token, validate_refresh_token,
};
use crate::auth::password::{hash_password, verify_dummy_password, verify_password};
use crate::auth::session::{
    csrf_token_for, deliver_session, issue_session, token_error, AuthResponse, IssuedSession,
    SessionRequest,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::middleware::csrf::verify_login_csrf;
use crate::middleware::origin::verify_origin;
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Consecutive failed password attempts before the account is locked.
pub const MAX_FAILED_ATTEMPTS: i32 = 10;

/// How long a locked account stays locked.
const LOCK_DURATION_MINS: i64 = 15;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accepted_tos: bool,
    #[serde(default)]
    pub platform: Platform,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub platform: Platform,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

/// Request body for `POST /auth/refresh`. Web clients send the cookie instead.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Request body for `POST /auth/logout`. All fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    pub device_token: Option<String>,
}

/// Request body for `POST /auth/password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Required when the account already has a password.
    pub current_password: Option<String>,
    pub new_password: String,
    /// Native clients pass their device to receive a fresh device token.
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/auth/login-csrf
///
/// Issue a pre-login CSRF token as both a cookie and a response field.
pub async fn login_csrf(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<CsrfResponse>) {
    let token = generate_csrf_token(
        state.config.auth.csrf_secret.as_bytes(),
        LOGIN_CSRF_SESSION,
        Utc::now().timestamp(),
    );
    let jar = with_login_csrf_cookie(jar, &token, &state.config);
    (jar, Json(CsrfResponse { csrf_token: token }))
}

/// POST /api/v1/auth/signup
///
/// Create an email/password account and sign it in. Returns 201.
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    // 1. Request provenance.
    verify_origin(&headers, &state.config)?;
    if !input.platform.is_native() {
        verify_login_csrf(&jar, &headers, &state.config.auth.csrf_secret)?;
    }
    rate_limit::enforce(&state.pool, &SIGNUP, "ip", &client.ip).await?;

    // 2. Validate input.
    validate_name(&input.name).map_err(AppError::validation)?;
    let email = normalize_email(&input.email);
    validate_email(&email).map_err(AppError::validation)?;
    validate_password_strength(&input.password).map_err(AppError::validation)?;
    if input.password != input.confirm_password {
        return Err(AppError::validation("Passwords do not match"));
    }
    if !input.accepted_tos {
        return Err(AppError::validation("You must accept the Terms of Service"));
    }
    validate_optional_device(input.device_id.as_deref())?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "An account with this email already exists".into(),
        )));
    }

    // 3. Create the account. A concurrent signup for the same email fails
    //    on `uq_users_email` and maps to 409.
    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            name: input.name.trim().to_string(),
            email,
            password_hash: Some(password_hash),
            provider: AuthProvider::Email,
            google_id: None,
            apple_id: None,
            image: None,
            email_verified: false,
            tos_accepted: true,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, platform = %input.platform, "User signed up");

    // 4. Sign in.
    let session = issue_session(
        &state,
        &user,
        &SessionRequest {
            platform: input.platform,
            device_id: input.device_id.as_deref(),
            device_name: input.device_name.as_deref(),
            existing_device_token_id: None,
            client: &client,
        },
    )
    .await?;
    let (jar, body) = deliver_session(jar, session, &user, input.platform, &state.config);
    Ok((StatusCode::CREATED, jar, body))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    // 1. Request provenance and rate limits (per IP and per email).
    verify_origin(&headers, &state.config)?;
    if !input.platform.is_native() {
        verify_login_csrf(&jar, &headers, &state.config.auth.csrf_secret)?;
    }
    let email = normalize_email(&input.email);
    rate_limit::enforce(&state.pool, &LOGIN, "ip", &client.ip).await?;
    rate_limit::enforce(&state.pool, &LOGIN, "email", &email).await?;
    validate_optional_device(input.device_id.as_deref())?;

    // 2. Find the user. Unknown emails and password-less accounts still pay
    //    for one hash verification.
    let Some(user) = UserRepo::find_by_email(&state.pool, &email).await? else {
        verify_dummy_password(&input.password);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    // 3. Account state.
    if !user.is_active {
        return Err(AppError::forbidden("Account is deactivated"));
    }
    if user.is_locked(Utc::now()) {
        return Err(AppError::forbidden(
            "Account is temporarily locked. Try again later.",
        ));
    }

    // 4. Verify password.
    let Some(password_hash) = user.password_hash.as_deref() else {
        verify_dummy_password(&input.password);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };
    let password_valid = verify_password(&input.password, password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        // 5. On failure: increment counter, lock if threshold reached.
        let failed = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failed >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, failed, "Account locked after failed logins");
        }
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    // 6. On success: reset counters and issue a session.
    UserRepo::record_successful_login(&state.pool, user.id).await?;
    rate_limit::reset(&state.pool, &LOGIN, "email", &email).await?;

    let session = issue_session(
        &state,
        &user,
        &SessionRequest {
            platform: input.platform,
            device_id: input.device_id.as_deref(),
            device_name: input.device_name.as_deref(),
            existing_device_token_id: None,
            client: &client,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, platform = %input.platform, "User logged in");
    Ok(deliver_session(jar, session, &user, input.platform, &state.config))
}

/// POST /api/v1/auth/refresh
///
/// Rotate a refresh token. The presented token is consumed; presenting it
/// again revokes every session of the user.
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    verify_origin(&headers, &state.config)?;
    rate_limit::enforce(&state.pool, &REFRESH, "ip", &client.ip).await?;

    let input: RefreshRequest = parse_optional_body(&body)?;
    let config = &state.config;
    let Some(token) = input.refresh_token.or_else(|| cookie_value(&jar, REFRESH_TOKEN_COOKIE))
    else {
        return Err(AppError::unauthorized("Missing refresh token"));
    };

    // 1. Signature, expiry and type.
    let Ok(claims) = validate_refresh_token(&token, &config.jwt) else {
        return Ok(reject_refresh(jar, &state, "Invalid or expired refresh token"));
    };

    // 2. Consume the stored token and store its replacement atomically.
    let replacement =
        generate_refresh_token(claims.sub, claims.tv, &claims.role, claims.platform, &config.jwt)
            .map_err(token_error)?;
    let outcome = RefreshTokenRepo::rotate(
        &state.pool,
        &hash_refresh_token(&token),
        claims.sub,
        claims.tv,
        &ReplacementRefreshToken {
            token_hash: replacement.hash.clone(),
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address(),
            expires_at: replacement.expires_at,
        },
    )
    .await?;

    match outcome {
        RotationOutcome::Rotated { user, .. } => {
            let access_token = generate_access_token(
                user.id,
                user.token_version,
                &user.role,
                claims.platform,
                &config.jwt,
            )
            .map_err(token_error)?;
            let session = IssuedSession {
                access_token,
                refresh_token: replacement.token,
                device_token: None,
                csrf_token: csrf_token_for(&user, config),
                expires_in: config.jwt.access_token_expiry_mins * 60,
            };
            tracing::debug!(user_id = user.id, platform = %claims.platform, "Refresh token rotated");
            Ok(deliver_session(jar, session, &user, claims.platform, config).into_response())
        }
        RotationOutcome::ReuseDetected {
            user_id,
            new_token_version,
        } => {
            tracing::warn!(
                user_id,
                new_token_version,
                ip = %client.ip,
                "Refresh token reuse detected, revoked all sessions"
            );
            Ok(reject_refresh(jar, &state, "Refresh token has already been used"))
        }
        RotationOutcome::Expired => Ok(reject_refresh(jar, &state, "Refresh token has expired")),
        RotationOutcome::Invalid | RotationOutcome::Revoked => {
            Ok(reject_refresh(jar, &state, "Invalid or expired refresh token"))
        }
    }
}

/// POST /api/v1/auth/logout
///
/// Delete the presented refresh token, revoke the presented device token and
/// clear cookies. Always returns 204.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(CookieJar, StatusCode)> {
    verify_origin(&headers, &state.config)?;
    let input: LogoutRequest = parse_optional_body(&body)?;

    if let Some(token) = input
        .refresh_token
        .or_else(|| cookie_value(&jar, REFRESH_TOKEN_COOKIE))
    {
        RefreshTokenRepo::delete_by_hash(&state.pool, &hash_refresh_token(&token)).await?;
    }
    if let Some(device_token) = input.device_token {
        DeviceTokenRepo::revoke_by_hash(
            &state.pool,
            &hash_device_token(&device_token),
            revoke_reason::LOGOUT,
        )
        .await?;
    }

    Ok((
        without_session_cookies(jar, &state.config),
        StatusCode::NO_CONTENT,
    ))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserResponse>> {
    let user = load_user(&state, &auth).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// GET /api/v1/auth/csrf
///
/// Mint a CSRF token for the current session.
pub async fn csrf(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<CsrfResponse>> {
    let user = load_user(&state, &auth).await?;
    Ok(Json(CsrfResponse {
        csrf_token: csrf_token_for(&user, &state.config),
    }))
}

/// POST /api/v1/auth/sessions/revoke-all
///
/// Log out everywhere, including the current session.
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, StatusCode)> {
    SessionRepo::revoke_all_for_user(&state.pool, auth.user_id, revoke_reason::SESSIONS_REVOKED)
        .await?;
    Ok((
        without_session_cookies(jar, &state.config),
        StatusCode::NO_CONTENT,
    ))
}

/// POST /api/v1/auth/password
///
/// Change (or, for OAuth-only accounts, set) the password. Every other
/// session is revoked and the caller receives a fresh one.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    rate_limit::enforce(
        &state.pool,
        &PASSWORD_CHANGE,
        "user",
        &auth.user_id.to_string(),
    )
    .await?;

    let user = load_user(&state, &auth).await?;
    if let Some(existing) = user.password_hash.as_deref() {
        let current = input
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::validation("Current password is required"))?;
        let valid = verify_password(current, existing)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
        if !valid {
            return Err(AppError::unauthorized("Current password is incorrect"));
        }
    }
    validate_password_strength(&input.new_password).map_err(AppError::validation)?;
    validate_optional_device(input.device_id.as_deref())?;

    let new_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &new_hash).await?;
    SessionRepo::revoke_all_for_user(&state.pool, user.id, revoke_reason::SESSIONS_REVOKED)
        .await?;
    tracing::info!(user_id = user.id, "Password changed, sessions revoked");

    // Reload for the bumped token version.
    let user = load_user(&state, &auth).await?;
    let platform = if auth.via_cookie {
        Platform::Web
    } else {
        auth.platform
    };
    let session = issue_session(
        &state,
        &user,
        &SessionRequest {
            platform,
            device_id: input.device_id.as_deref(),
            device_name: input.device_name.as_deref(),
            existing_device_token_id: None,
            client: &client,
        },
    )
    .await?;
    Ok(deliver_session(jar, session, &user, platform, &state.config))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_user(state: &AppState, auth: &AuthUser) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))
}

/// Parse an optional JSON body. An empty body yields `T::default()`.
pub(crate) fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn validate_optional_device(device_id: Option<&str>) -> AppResult<()> {
    match device_id {
        Some(id) => validate_device_id(id).map_err(AppError::validation),
        None => Ok(()),
    }
}

/// 401 that also clears the web session cookies.
fn reject_refresh(jar: CookieJar, state: &AppState, message: &str) -> Response {
    (
        without_session_cookies(jar, &state.config),
        AppError::unauthorized(message),
    )
        .into_response()
}
