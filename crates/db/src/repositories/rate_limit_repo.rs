//! Repository for the `rate_limit_buckets` table.

use pagespace_core::rate_limit::{evaluate, RateLimitDecision, RateLimitPolicy};
use pagespace_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::rate_limit::RateLimitBucket;

/// Persists shared rate-limit counters.
pub struct RateLimitRepo;

impl RateLimitRepo {
    /// Count one attempt for `key` under `policy` and return the decision.
    ///
    /// The bucket row is created if missing and then locked with
    /// `FOR UPDATE`, so concurrent attempts across instances serialize.
    pub async fn hit(
        pool: &PgPool,
        key: &str,
        policy: &RateLimitPolicy,
        now: Timestamp,
    ) -> Result<RateLimitDecision, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO rate_limit_buckets (key, attempts, window_start)
             VALUES ($1, 0, $2)
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let bucket = sqlx::query_as::<_, RateLimitBucket>(
            "SELECT key, attempts, window_start, blocked_until, updated_at
             FROM rate_limit_buckets WHERE key = $1 FOR UPDATE",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        let current = bucket.to_state();
        let (next, decision) = evaluate(current.as_ref(), policy, now);

        sqlx::query(
            "UPDATE rate_limit_buckets SET
                attempts = $2,
                window_start = $3,
                blocked_until = $4,
                updated_at = $5
             WHERE key = $1",
        )
        .bind(key)
        .bind(next.attempts)
        .bind(next.window_start)
        .bind(next.blocked_until)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(decision)
    }

    /// Clear a bucket (e.g. after a successful login).
    pub async fn reset(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM rate_limit_buckets WHERE key = $1")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete buckets idle since `cutoff` that are not currently blocked.
    pub async fn delete_idle(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM rate_limit_buckets
             WHERE updated_at < $1 AND (blocked_until IS NULL OR blocked_until < NOW())",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
