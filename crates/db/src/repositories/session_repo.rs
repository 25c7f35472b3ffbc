//! Whole-account session revocation across `users`, `refresh_tokens` and
//! `device_tokens`.

use pagespace_core::types::DbId;
use sqlx::{PgConnection, PgPool};

/// Revokes every credential a user holds.
pub struct SessionRepo;

impl SessionRepo {
    /// Bump the user's token version, delete all refresh tokens and revoke
    /// all device tokens in one transaction.
    ///
    /// Returns the new token version, or `None` if the user does not exist.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        reason: &str,
    ) -> Result<Option<i32>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let version = Self::revoke_all_in_tx(&mut tx, user_id, reason).await?;
        tx.commit().await?;
        Ok(version)
    }

    /// Transaction-scoped body of [`Self::revoke_all_for_user`], shared with
    /// refresh-token reuse detection.
    pub(crate) async fn revoke_all_in_tx(
        conn: &mut PgConnection,
        user_id: DbId,
        reason: &str,
    ) -> Result<Option<i32>, sqlx::Error> {
        let version: Option<(i32,)> = sqlx::query_as(
            "UPDATE users SET token_version = token_version + 1
             WHERE id = $1
             RETURNING token_version",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let devices = sqlx::query(
            "UPDATE device_tokens SET revoked_at = NOW(), revoked_reason = $2
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(reason)
        .execute(&mut *conn)
        .await?;

        tracing::info!(
            user_id,
            reason,
            refresh_tokens = refresh.rows_affected(),
            device_tokens = devices.rows_affected(),
            "Revoked all sessions for user"
        );

        Ok(version.map(|v| v.0))
    }
}
