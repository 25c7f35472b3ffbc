//! Repository for the `device_tokens` table.

use pagespace_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::device_token::{revoke_reason, CreateDeviceToken, DeviceToken};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token_hash, device_id, platform, device_name, user_agent, \
                        ip_address, token_version, last_used_at, expires_at, revoked_at, \
                        revoked_reason, created_at";

/// Provides issue, lookup and revocation of device tokens.
pub struct DeviceTokenRepo;

impl DeviceTokenRepo {
    /// Issue a device token, revoking any live token for the same
    /// `(user, device_id, platform)` first.
    pub async fn issue(
        pool: &PgPool,
        input: &CreateDeviceToken,
    ) -> Result<DeviceToken, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE device_tokens SET revoked_at = NOW(), revoked_reason = $4
             WHERE user_id = $1 AND device_id = $2 AND platform = $3 AND revoked_at IS NULL",
        )
        .bind(input.user_id)
        .bind(&input.device_id)
        .bind(input.platform.as_str())
        .bind(revoke_reason::REPLACED)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO device_tokens
                (user_id, token_hash, device_id, platform, device_name, user_agent,
                 ip_address, token_version, last_used_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), $9)
             RETURNING {COLUMNS}"
        );
        let token = sqlx::query_as::<_, DeviceToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(&input.device_id)
            .bind(input.platform.as_str())
            .bind(&input.device_name)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(input.token_version)
            .bind(input.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(token)
    }

    /// Find a live (not revoked, not expired) token by hash.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<DeviceToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_tokens
             WHERE token_hash = $1
               AND revoked_at IS NULL
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, DeviceToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Record use of a token and refresh its client metadata.
    pub async fn touch(
        pool: &PgPool,
        id: DbId,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE device_tokens SET
                last_used_at = NOW(),
                user_agent = COALESCE($2, user_agent),
                ip_address = COALESCE($3, ip_address)
             WHERE id = $1",
        )
        .bind(id)
        .bind(user_agent)
        .bind(ip_address)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Replace a token that is close to expiry with a new one for the same device.
    ///
    /// Refresh tokens linked to the old device token are moved to the new one.
    /// Returns `None` if the old token is no longer live.
    pub async fn rotate(
        pool: &PgPool,
        old_id: DbId,
        new_token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<Option<DeviceToken>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE device_tokens SET revoked_at = NOW(), revoked_reason = $2
             WHERE id = $1 AND revoked_at IS NULL
             RETURNING {COLUMNS}"
        );
        let old = sqlx::query_as::<_, DeviceToken>(&query)
            .bind(old_id)
            .bind(revoke_reason::ROTATED)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(old) = old else {
            tx.commit().await?;
            return Ok(None);
        };

        let query = format!(
            "INSERT INTO device_tokens
                (user_id, token_hash, device_id, platform, device_name, user_agent,
                 ip_address, token_version, last_used_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), $9)
             RETURNING {COLUMNS}"
        );
        let new = sqlx::query_as::<_, DeviceToken>(&query)
            .bind(old.user_id)
            .bind(new_token_hash)
            .bind(&old.device_id)
            .bind(&old.platform)
            .bind(&old.device_name)
            .bind(&old.user_agent)
            .bind(&old.ip_address)
            .bind(old.token_version)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE refresh_tokens SET device_token_id = $2 WHERE device_token_id = $1")
            .bind(old.id)
            .bind(new.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(new))
    }

    /// List a user's live devices, most recently used first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DeviceToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_tokens
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
             ORDER BY last_used_at DESC NULLS LAST, created_at DESC"
        );
        sqlx::query_as::<_, DeviceToken>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Revoke one of a user's devices and mark the refresh tokens bound to it
    /// as revoked.
    ///
    /// Scoped by `user_id` so users cannot revoke each other's devices.
    /// Returns `true` if a live token was revoked.
    pub async fn revoke(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE device_tokens SET revoked_at = NOW(), revoked_reason = $3
             WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW()
                 WHERE device_token_id = $1 AND revoked_at IS NULL",
            )
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(revoked)
    }

    /// Revoke the token with the given hash (logout from a device).
    pub async fn revoke_by_hash(
        pool: &PgPool,
        token_hash: &str,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId, DbId)> = sqlx::query_as(
            "SELECT id, user_id FROM device_tokens WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

        match row {
            Some((id, user_id)) => Self::revoke(pool, user_id, id, reason).await,
            None => Ok(false),
        }
    }

    /// Revoke all of a user's devices except `keep_device_id`.
    ///
    /// Returns the number of revoked devices.
    pub async fn revoke_all_except(
        pool: &PgPool,
        user_id: DbId,
        keep_device_id: Option<&str>,
        reason: &str,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let revoked: Vec<(DbId,)> = sqlx::query_as(
            "UPDATE device_tokens SET revoked_at = NOW(), revoked_reason = $3
             WHERE user_id = $1
               AND revoked_at IS NULL
               AND ($2::TEXT IS NULL OR device_id <> $2)
             RETURNING id",
        )
        .bind(user_id)
        .bind(keep_device_id)
        .bind(reason)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<DbId> = revoked.iter().map(|r| r.0).collect();
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW()
             WHERE device_token_id = ANY($1) AND revoked_at IS NULL",
        )
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids.len() as u64)
    }

    /// Delete tokens that expired or were revoked before `cutoff`.
    pub async fn delete_stale(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM device_tokens WHERE expires_at < $1 OR revoked_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
