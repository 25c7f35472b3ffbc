//! Admin-only handlers.

use axum::extract::{Path, State};
use axum::Json;
use pagespace_core::error::CoreError;
use pagespace_core::types::DbId;
use pagespace_db::models::device_token::revoke_reason;
use pagespace_db::repositories::SessionRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RevokeSessionsResponse {
    pub user_id: DbId,
    pub token_version: i32,
}

/// POST /api/v1/admin/users/{id}/revoke-sessions
///
/// Force-logout a user everywhere: bump the token version, delete refresh
/// tokens and revoke device tokens.
pub async fn revoke_user_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<RevokeSessionsResponse>> {
    let token_version =
        SessionRepo::revoke_all_for_user(&state.pool, id, revoke_reason::SESSIONS_REVOKED)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    tracing::info!(admin_id = admin.user_id, user_id = id, token_version, "Admin revoked user sessions");

    Ok(Json(RevokeSessionsResponse {
        user_id: id,
        token_version,
    }))
}
