//! Repository for the `refresh_tokens` table, including atomic rotation.

use chrono::Utc;
use pagespace_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use super::session_repo::SessionRepo;
use super::user_repo::COLUMNS as USER_COLUMNS;
use crate::models::device_token::revoke_reason;
use crate::models::refresh_token::{
    CreateRefreshToken, RefreshToken, ReplacementRefreshToken, RotationOutcome,
};
use crate::models::user::User;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token_hash, device_token_id, platform, user_agent, \
                        ip_address, expires_at, revoked_at, created_at";

/// Provides storage and rotation of refresh tokens.
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    /// Insert a new refresh token, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRefreshToken,
    ) -> Result<RefreshToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO refresh_tokens
                (user_id, token_hash, device_token_id, platform, user_agent, ip_address, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(input.device_token_id)
            .bind(input.platform.as_str())
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a token by its hash regardless of expiry.
    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete a single token (logout). Returns `true` if a row was removed.
    pub async fn delete_by_hash(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a user's live (not revoked) refresh tokens.
    pub async fn count_for_user(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Atomically consume `presented_hash` and store `replacement`.
    ///
    /// `claimed_user_id` and `claimed_version` come from the verified token
    /// claims. A token that verifies, still carries the user's current
    /// version and is no longer stored has already been used, so every
    /// session of the claimed user is revoked. Tokens made stale by an
    /// earlier revocation only report `Revoked`.
    ///
    /// Lock order is user row, then device row, then refresh-token rows.
    /// [`SessionRepo::revoke_all_for_user`] also takes the user row first.
    pub async fn rotate(
        pool: &PgPool,
        presented_hash: &str,
        claimed_user_id: DbId,
        claimed_version: i32,
        replacement: &ReplacementRefreshToken,
    ) -> Result<RotationOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(claimed_user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = user else {
            tx.commit().await?;
            return Ok(RotationOutcome::Invalid);
        };

        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let stored = sqlx::query_as::<_, RefreshToken>(&query)
            .bind(presented_hash)
            .fetch_optional(&mut *tx)
            .await?;

        let consumed = match stored {
            None if user.token_version != claimed_version => {
                tx.commit().await?;
                return Ok(RotationOutcome::Revoked);
            }
            None => {
                let new_version = SessionRepo::revoke_all_in_tx(
                    &mut tx,
                    claimed_user_id,
                    revoke_reason::TOKEN_REUSE,
                )
                .await?;
                tx.commit().await?;
                return Ok(match new_version {
                    Some(new_token_version) => RotationOutcome::ReuseDetected {
                        user_id: claimed_user_id,
                        new_token_version,
                    },
                    None => RotationOutcome::Invalid,
                });
            }
            Some(stored) if stored.user_id != claimed_user_id => {
                tx.commit().await?;
                return Ok(RotationOutcome::Invalid);
            }
            // Tombstone left by a device revocation: kept so replays stay `Revoked`.
            Some(stored) if stored.revoked_at.is_some() => {
                tx.commit().await?;
                return Ok(RotationOutcome::Revoked);
            }
            Some(stored) => stored,
        };

        // Share-lock the device before touching the token row so a concurrent
        // device revocation either finishes first or sees the replacement.
        if let Some(device_token_id) = consumed.device_token_id {
            let device: Option<(Option<Timestamp>,)> = sqlx::query_as(
                "SELECT revoked_at FROM device_tokens WHERE id = $1 FOR SHARE",
            )
            .bind(device_token_id)
            .fetch_optional(&mut *tx)
            .await?;
            if !matches!(device, Some((None,))) {
                tx.commit().await?;
                return Ok(RotationOutcome::Revoked);
            }
        }

        // Delete-on-use.
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(consumed.id)
            .execute(&mut *tx)
            .await?;

        if consumed.expires_at <= Utc::now() {
            tx.commit().await?;
            return Ok(RotationOutcome::Expired);
        }

        if !user.is_active || user.token_version != claimed_version {
            tx.commit().await?;
            return Ok(RotationOutcome::Revoked);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens
                (user_id, token_hash, device_token_id, platform, user_agent, ip_address, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(consumed.user_id)
        .bind(&replacement.token_hash)
        .bind(consumed.device_token_id)
        .bind(&consumed.platform)
        .bind(&replacement.user_agent)
        .bind(&replacement.ip_address)
        .bind(replacement.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RotationOutcome::Rotated { user, consumed })
    }

    /// Delete expired tokens. Returns the count of deleted rows.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
