//! Handlers for Google and Apple sign-in.
//!
//! Web and desktop use redirect flows with a signed `state`. Mobile and
//! desktop SDKs may instead post an ID token obtained natively.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use pagespace_core::error::CoreError;
use pagespace_core::oauth_state::{decode_state, encode_state, OAuthStatePayload};
use pagespace_core::platform::{AuthProvider, Platform};
use pagespace_core::rate_limit::OAUTH;
use pagespace_core::return_url::sanitize_return_url;
use pagespace_db::models::exchange_code::CreateExchangeCode;
use pagespace_db::models::user::User;
use pagespace_db::repositories::ExchangeCodeRepo;
use reqwest::Url;
use serde::Deserialize;

use super::auth::validate_optional_device;
use crate::auth::device::{generate_exchange_code, EXCHANGE_CODE_TTL_SECS};
use crate::auth::session::{deliver_session, issue_session, AuthResponse, SessionRequest};
use crate::config::{AppleOAuthConfig, GoogleOAuthConfig};
use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientInfo;
use crate::middleware::rate_limit;
use crate::oauth::identity::find_or_create_user;
use crate::oauth::providers::{apple_authorize_url, google_authorize_url};
use crate::oauth::OAuthError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query for `GET /auth/{provider}/signin`.
#[derive(Debug, Default, Deserialize)]
pub struct SigninQuery {
    #[serde(default)]
    pub platform: Platform,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub return_url: Option<String>,
}

/// Query for `GET /auth/google/callback`.
#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Form Apple posts to `POST /auth/apple/callback`.
#[derive(Debug, Deserialize)]
pub struct AppleCallbackForm {
    pub id_token: Option<String>,
    pub state: Option<String>,
    /// JSON with the user's name, sent only on first authorization.
    pub user: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppleUserPayload {
    name: Option<AppleName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleName {
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Request body for `POST /auth/google/native`.
#[derive(Debug, Deserialize)]
pub struct GoogleNativeRequest {
    pub id_token: String,
    pub platform: Platform,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

/// Request body for `POST /auth/apple/native`.
#[derive(Debug, Deserialize)]
pub struct AppleNativeRequest {
    pub identity_token: String,
    pub platform: Platform,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Google
// ---------------------------------------------------------------------------

/// GET /api/v1/auth/google/signin
///
/// Redirect to Google's consent screen.
pub async fn google_signin(
    State(state): State<AppState>,
    client: ClientInfo,
    Query(query): Query<SigninQuery>,
) -> AppResult<Redirect> {
    let google = google_config(&state)?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;
    let signed_state = signed_state(&state, query)?;
    let url = google_authorize_url(google, &signed_state).map_err(oauth_internal)?;
    Ok(Redirect::to(url.as_str()))
}

/// GET /api/v1/auth/google/callback
///
/// Failures redirect to the web sign-in page with an `error` code.
pub async fn google_callback(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    match google_callback_flow(&state, &client, jar, query).await {
        Ok(response) => response,
        Err(err) => signin_error_redirect(&state, &err).into_response(),
    }
}

async fn google_callback_flow(
    state: &AppState,
    client: &ClientInfo,
    jar: CookieJar,
    query: GoogleCallbackQuery,
) -> AppResult<Response> {
    if let Some(error) = query.error {
        tracing::info!(error, "Google sign-in cancelled or failed at provider");
        return Err(AppError::forbidden("access_denied"));
    }
    let payload = verify_callback_state(state, query.state.as_deref())?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;

    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;
    let google = google_config(state)?;
    let id_token = state
        .oauth
        .exchange_google_code(google, &code)
        .await
        .map_err(oauth_rejected)?;
    let identity = state
        .oauth
        .verify_id_token(AuthProvider::Google, &id_token, &[google.client_id.clone()])
        .await
        .map_err(oauth_rejected)?;

    let user = find_or_create_user(&state.pool, &identity, None).await?;
    complete_redirect_flow(state, client, jar, &user, &payload).await
}

/// POST /api/v1/auth/google/native
pub async fn google_native(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<GoogleNativeRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let google = google_config(&state)?;
    require_native(input.platform)?;
    validate_optional_device(input.device_id.as_deref())?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;

    let identity = state
        .oauth
        .verify_id_token(AuthProvider::Google, &input.id_token, &google.audiences())
        .await
        .map_err(oauth_rejected)?;
    let user = find_or_create_user(&state.pool, &identity, None).await?;

    native_session(
        &state,
        &client,
        jar,
        &user,
        input.platform,
        input.device_id.as_deref(),
        input.device_name.as_deref(),
    )
    .await
}

// ---------------------------------------------------------------------------
// Apple
// ---------------------------------------------------------------------------

/// GET /api/v1/auth/apple/signin
pub async fn apple_signin(
    State(state): State<AppState>,
    client: ClientInfo,
    Query(query): Query<SigninQuery>,
) -> AppResult<Redirect> {
    let apple = apple_config(&state)?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;
    let signed_state = signed_state(&state, query)?;
    let url = apple_authorize_url(apple, &signed_state).map_err(oauth_internal)?;
    Ok(Redirect::to(url.as_str()))
}

/// POST /api/v1/auth/apple/callback
///
/// Apple posts the ID token directly, so no code exchange is needed.
pub async fn apple_callback(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Form(form): Form<AppleCallbackForm>,
) -> Response {
    match apple_callback_flow(&state, &client, jar, form).await {
        Ok(response) => response,
        Err(err) => signin_error_redirect(&state, &err).into_response(),
    }
}

async fn apple_callback_flow(
    state: &AppState,
    client: &ClientInfo,
    jar: CookieJar,
    form: AppleCallbackForm,
) -> AppResult<Response> {
    if let Some(error) = form.error {
        tracing::info!(error, "Apple sign-in cancelled or failed at provider");
        return Err(AppError::forbidden("access_denied"));
    }
    let payload = verify_callback_state(state, form.state.as_deref())?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;

    let id_token = form
        .id_token
        .ok_or_else(|| AppError::BadRequest("Missing id_token".into()))?;
    let apple = apple_config(state)?;
    let identity = state
        .oauth
        .verify_id_token(AuthProvider::Apple, &id_token, &[apple.service_id.clone()])
        .await
        .map_err(oauth_rejected)?;

    let name = form.user.as_deref().and_then(apple_user_name);
    let user = find_or_create_user(&state.pool, &identity, name.as_deref()).await?;
    complete_redirect_flow(state, client, jar, &user, &payload).await
}

/// POST /api/v1/auth/apple/native
pub async fn apple_native(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<AppleNativeRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let apple = apple_config(&state)?;
    require_native(input.platform)?;
    validate_optional_device(input.device_id.as_deref())?;
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;

    let identity = state
        .oauth
        .verify_id_token(AuthProvider::Apple, &input.identity_token, &apple.audiences())
        .await
        .map_err(oauth_rejected)?;

    let name = join_name(input.given_name.as_deref(), input.family_name.as_deref());
    let user = find_or_create_user(&state.pool, &identity, name.as_deref()).await?;

    native_session(
        &state,
        &client,
        jar,
        &user,
        input.platform,
        input.device_id.as_deref(),
        input.device_name.as_deref(),
    )
    .await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn google_config(state: &AppState) -> AppResult<&GoogleOAuthConfig> {
    state
        .config
        .oauth
        .google
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google sign-in is not configured".into()))
}

fn apple_config(state: &AppState) -> AppResult<&AppleOAuthConfig> {
    state
        .config
        .oauth
        .apple
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Apple sign-in is not configured".into()))
}

fn require_native(platform: Platform) -> AppResult<()> {
    if platform.is_native() {
        Ok(())
    } else {
        Err(AppError::validation(
            "Native sign-in requires a desktop or mobile platform",
        ))
    }
}

/// Build and sign the `state` for a redirect flow.
fn signed_state(state: &AppState, query: SigninQuery) -> AppResult<String> {
    validate_optional_device(query.device_id.as_deref())?;
    if query.platform.is_native() && query.device_id.is_none() {
        return Err(AppError::validation("Device id is required for app sign-in"));
    }
    let payload = OAuthStatePayload::new(
        query.platform,
        query.device_id,
        query.device_name,
        sanitize_return_url(query.return_url.as_deref()),
        Utc::now().timestamp(),
    );
    Ok(encode_state(
        state.config.auth.csrf_secret.as_bytes(),
        &payload,
    ))
}

fn verify_callback_state(state: &AppState, raw: Option<&str>) -> AppResult<OAuthStatePayload> {
    let raw = raw.ok_or_else(|| AppError::BadRequest("invalid_state".into()))?;
    decode_state(
        state.config.auth.csrf_secret.as_bytes(),
        raw,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected OAuth callback state");
        AppError::BadRequest("invalid_state".into())
    })
}

/// Finish a redirect flow: web gets cookies and a redirect to the return
/// URL, native clients get a one-time exchange code on their deep link.
async fn complete_redirect_flow(
    state: &AppState,
    client: &ClientInfo,
    jar: CookieJar,
    user: &User,
    payload: &OAuthStatePayload,
) -> AppResult<Response> {
    let config = &state.config;

    if payload.platform.is_native() {
        let device_id = payload
            .device_id
            .clone()
            .ok_or_else(|| AppError::validation("Device id is required for app sign-in"))?;
        let (code, code_hash) = generate_exchange_code();
        ExchangeCodeRepo::create(
            &state.pool,
            &CreateExchangeCode {
                code_hash,
                user_id: user.id,
                device_id,
                device_name: payload.device_name.clone(),
                expires_at: Utc::now() + Duration::seconds(EXCHANGE_CODE_TTL_SECS),
            },
        )
        .await?;
        let url = Url::parse_with_params(
            &config.auth.desktop_redirect_uri,
            &[
                ("code", code.as_str()),
                ("return_url", payload.return_url.as_str()),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Invalid desktop redirect URI: {e}")))?;
        tracing::info!(user_id = user.id, platform = %payload.platform, "Issued exchange code");
        return Ok(Redirect::to(url.as_str()).into_response());
    }

    let session = issue_session(
        state,
        user,
        &SessionRequest {
            platform: Platform::Web,
            device_id: None,
            device_name: None,
            existing_device_token_id: None,
            client,
        },
    )
    .await?;
    let (jar, _) = deliver_session(jar, session, user, Platform::Web, config);
    let target = format!(
        "{}{}",
        config.auth.web_app_url.trim_end_matches('/'),
        sanitize_return_url(Some(payload.return_url.as_str()))
    );
    Ok((jar, Redirect::to(&target)).into_response())
}

async fn native_session(
    state: &AppState,
    client: &ClientInfo,
    jar: CookieJar,
    user: &User,
    platform: Platform,
    device_id: Option<&str>,
    device_name: Option<&str>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = issue_session(
        state,
        user,
        &SessionRequest {
            platform,
            device_id,
            device_name,
            existing_device_token_id: None,
            client,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, platform = %platform, "Native OAuth sign-in");
    Ok(deliver_session(jar, session, user, platform, &state.config))
}

/// Redirect to `/auth/signin?error=<code>` on the web app.
fn signin_error_redirect(state: &AppState, err: &AppError) -> Redirect {
    let code = match err {
        AppError::Core(CoreError::RateLimited { .. }) => "rate_limited",
        AppError::Core(CoreError::Forbidden(msg)) if msg == "access_denied" => "access_denied",
        AppError::Core(CoreError::Forbidden(msg)) if msg.contains("not verified") => {
            "email_not_verified"
        }
        AppError::Core(CoreError::Forbidden(_)) => "account_unavailable",
        AppError::Core(CoreError::Unauthorized(_)) => "invalid_token",
        AppError::BadRequest(msg) if msg == "invalid_state" => "invalid_state",
        AppError::BadRequest(_) | AppError::Core(CoreError::Validation(_)) => "invalid_request",
        other => {
            tracing::error!(error = %other, "OAuth callback failed");
            "server_error"
        }
    };
    Redirect::to(&format!(
        "{}/auth/signin?error={code}",
        state.config.auth.web_app_url.trim_end_matches('/')
    ))
}

fn oauth_rejected(err: OAuthError) -> AppError {
    match err {
        OAuthError::InvalidToken(reason) | OAuthError::Provider(reason) => {
            tracing::warn!(reason, "Identity provider rejected sign-in");
            AppError::unauthorized("Sign-in with the identity provider failed")
        }
        other => oauth_internal(other),
    }
}

fn oauth_internal(err: OAuthError) -> AppError {
    AppError::InternalError(err.to_string())
}

fn apple_user_name(raw: &str) -> Option<String> {
    let payload: AppleUserPayload = serde_json::from_str(raw).ok()?;
    let name = payload.name?;
    join_name(name.first_name.as_deref(), name.last_name.as_deref())
}

fn join_name(given: Option<&str>, family: Option<&str>) -> Option<String> {
    let joined = [given, family]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}
