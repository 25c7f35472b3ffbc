//! Handlers for device tokens: native session refresh, desktop code
//! exchange and the account devices list.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use pagespace_core::error::CoreError;
use pagespace_core::platform::Platform;
use pagespace_core::rate_limit::{DEVICE_REFRESH, OAUTH};
use pagespace_core::types::DbId;
use pagespace_db::models::device_token::{revoke_reason, DeviceResponse};
use pagespace_db::repositories::{DeviceTokenRepo, ExchangeCodeRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::auth::device::{
    generate_device_token, hash_device_token, hash_exchange_code, needs_rotation,
};
use crate::auth::session::{deliver_session, issue_session, AuthResponse, SessionRequest};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::middleware::rate_limit;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/device/refresh`.
#[derive(Debug, Deserialize)]
pub struct DeviceRefreshRequest {
    pub device_token: String,
    pub device_id: String,
}

/// Request body for `POST /auth/desktop/exchange`.
#[derive(Debug, Deserialize)]
pub struct DesktopExchangeRequest {
    pub code: String,
    pub device_id: String,
}

/// Request body for `POST /account/devices/revoke-others`.
#[derive(Debug, Default, Deserialize)]
pub struct RevokeOthersRequest {
    /// Device to keep. When absent, every device is revoked.
    pub current_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevokeOthersResponse {
    pub revoked: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/device/refresh
///
/// Exchange a device token for a new access/refresh pair. Device tokens
/// close to expiry are rotated and the new one is returned.
pub async fn device_refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<DeviceRefreshRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    rate_limit::enforce(&state.pool, &DEVICE_REFRESH, "device", &input.device_id).await?;

    // 1. Token must be live and bound to the presenting device.
    let device =
        DeviceTokenRepo::find_active_by_hash(&state.pool, &hash_device_token(&input.device_token))
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or expired device token"))?;

    if device.device_id != input.device_id {
        tracing::warn!(
            device_token_id = device.id,
            user_id = device.user_id,
            "Device token presented by a different device"
        );
        return Err(AppError::unauthorized("Invalid or expired device token"));
    }

    // 2. User must still be active and on the same token version.
    let user = UserRepo::find_by_id(&state.pool, device.user_id)
        .await?
        .filter(|u| u.is_active);
    let user = match user {
        Some(user) if user.token_version == device.token_version => user,
        _ => {
            DeviceTokenRepo::revoke(
                &state.pool,
                device.user_id,
                device.id,
                revoke_reason::SESSIONS_REVOKED,
            )
            .await?;
            return Err(AppError::unauthorized("Session has been revoked"));
        }
    };

    DeviceTokenRepo::touch(
        &state.pool,
        device.id,
        client.user_agent.as_deref(),
        client.ip_address().as_deref(),
    )
    .await?;

    // 3. Rotate the device token when it is close to expiry.
    let now = Utc::now();
    let (device_token_id, rotated_token) = if needs_rotation(device.expires_at, now) {
        let (token, hash) = generate_device_token();
        let expires_at = now + Duration::days(state.config.auth.device_token_expiry_days);
        let rotated = DeviceTokenRepo::rotate(&state.pool, device.id, &hash, expires_at)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or expired device token"))?;
        tracing::info!(
            user_id = user.id,
            old_device_token_id = device.id,
            new_device_token_id = rotated.id,
            "Device token rotated"
        );
        (rotated.id, Some(token))
    } else {
        (device.id, None)
    };

    let platform: Platform = device.platform.parse().map_err(AppError::InternalError)?;
    let mut session = issue_session(
        &state,
        &user,
        &SessionRequest {
            platform,
            device_id: Some(&device.device_id),
            device_name: device.device_name.as_deref(),
            existing_device_token_id: Some(device_token_id),
            client: &client,
        },
    )
    .await?;
    session.device_token = rotated_token;

    Ok(deliver_session(jar, session, &user, platform, &state.config))
}

/// POST /api/v1/auth/desktop/exchange
///
/// Redeem a one-time code from the desktop OAuth redirect for tokens.
pub async fn desktop_exchange(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    Json(input): Json<DesktopExchangeRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    rate_limit::enforce(&state.pool, &OAUTH, "ip", &client.ip).await?;

    let exchange = ExchangeCodeRepo::consume(&state.pool, &hash_exchange_code(&input.code))
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or expired exchange code"))?;

    if exchange.device_id != input.device_id {
        tracing::warn!(user_id = exchange.user_id, "Exchange code redeemed by a different device");
        return Err(AppError::unauthorized("Invalid or expired exchange code"));
    }

    let user = UserRepo::find_by_id(&state.pool, exchange.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired exchange code"))?;

    let session = issue_session(
        &state,
        &user,
        &SessionRequest {
            platform: Platform::Desktop,
            device_id: Some(&exchange.device_id),
            device_name: exchange.device_name.as_deref(),
            existing_device_token_id: None,
            client: &client,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, "Desktop exchange code redeemed");
    Ok(deliver_session(jar, session, &user, Platform::Desktop, &state.config))
}

/// GET /api/v1/account/devices
pub async fn list_devices(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<DeviceResponse>>>> {
    let devices = DeviceTokenRepo::list_active_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: devices.iter().map(DeviceResponse::from).collect(),
    }))
}

/// DELETE /api/v1/account/devices/{id}
pub async fn revoke_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let revoked =
        DeviceTokenRepo::revoke(&state.pool, auth.user_id, id, revoke_reason::USER_REVOKED)
            .await?;
    if !revoked {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Device",
            id,
        }));
    }
    tracing::info!(user_id = auth.user_id, device_token_id = id, "Device revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/account/devices/revoke-others
pub async fn revoke_other_devices(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<RevokeOthersRequest>,
) -> AppResult<Json<RevokeOthersResponse>> {
    let revoked = DeviceTokenRepo::revoke_all_except(
        &state.pool,
        auth.user_id,
        input.current_device_id.as_deref(),
        revoke_reason::USER_REVOKED,
    )
    .await?;
    tracing::info!(user_id = auth.user_id, revoked, "Revoked other devices");
    Ok(Json(RevokeOthersResponse { revoked }))
}
