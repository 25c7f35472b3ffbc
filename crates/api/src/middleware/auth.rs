//! Session authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::CookieJar;
use pagespace_core::platform::Platform;
use pagespace_core::types::DbId;
use pagespace_db::repositories::UserRepo;

use super::csrf::verify_session_csrf;
use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::jwt::validate_access_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user, from a Bearer token or the `accessToken` cookie.
///
/// The token version is checked against the database on every request, so
/// revoking sessions takes effect immediately rather than at token expiry.
/// Cookie-authenticated requests with an unsafe method must also carry a
/// valid `x-csrf-token` header. Bearer requests are exempt because browsers
/// never attach that header on their own.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// Current role, read from the database.
    pub role: String,
    pub token_version: i32,
    pub platform: Platform,
    /// `true` when authenticated by cookie rather than `Authorization`.
    pub via_cookie: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|header| {
                header.strip_prefix("Bearer ").map(str::to_string).ok_or_else(|| {
                    AppError::unauthorized(
                        "Invalid Authorization format. Expected: Bearer <token>",
                    )
                })
            })
            .transpose()?;

        let (token, via_cookie) = match bearer {
            Some(token) => (token, false),
            None => {
                let jar = CookieJar::from_headers(&parts.headers);
                let token = jar
                    .get(ACCESS_TOKEN_COOKIE)
                    .map(|c| c.value().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
                (token, true)
            }
        };

        let claims = validate_access_token(&token, &state.config.jwt)
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

        let user = UserRepo::find_by_id(&state.pool, claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

        if user.token_version != claims.tv {
            return Err(AppError::unauthorized("Session has been revoked"));
        }

        if via_cookie && !parts.method.is_safe() {
            verify_session_csrf(
                &parts.headers,
                &state.config.auth.csrf_secret,
                user.id,
                user.token_version,
            )?;
        }

        Ok(AuthUser {
            user_id: user.id,
            role: user.role,
            token_version: user.token_version,
            platform: claims.platform,
            via_cookie,
        })
    }
}
