//! Rate-limit enforcement on top of the shared bucket table.

use chrono::Utc;
use pagespace_core::error::CoreError;
use pagespace_core::rate_limit::{RateLimitDecision, RateLimitPolicy};
use pagespace_db::repositories::RateLimitRepo;
use pagespace_db::DbPool;

use crate::error::{AppError, AppResult};

/// Count one attempt for `(kind, identifier)` and fail with 429 when blocked.
pub async fn enforce(
    pool: &DbPool,
    policy: &RateLimitPolicy,
    kind: &str,
    identifier: &str,
) -> AppResult<()> {
    let key = policy.key(kind, identifier);
    match RateLimitRepo::hit(pool, &key, policy, Utc::now()).await? {
        RateLimitDecision::Allowed { .. } => Ok(()),
        RateLimitDecision::Blocked { retry_after_secs } => {
            tracing::warn!(policy = policy.name, kind, retry_after_secs, "Rate limit exceeded");
            Err(AppError::Core(CoreError::RateLimited { retry_after_secs }))
        }
    }
}

/// Clear the bucket for `(kind, identifier)`, e.g. after a successful login.
pub async fn reset(
    pool: &DbPool,
    policy: &RateLimitPolicy,
    kind: &str,
    identifier: &str,
) -> AppResult<()> {
    RateLimitRepo::reset(pool, &policy.key(kind, identifier)).await?;
    Ok(())
}
