//! Periodic purge of dead credentials.
//!
//! Removes expired refresh tokens, device tokens that expired or were
//! revoked long enough ago, spent exchange codes and idle rate-limit
//! buckets. None of this affects correctness (every lookup already checks
//! expiry); it only keeps the tables small.

use std::time::Duration;

use chrono::Utc;
use pagespace_db::repositories::{
    DeviceTokenRepo, ExchangeCodeRepo, RateLimitRepo, RefreshTokenRepo,
};
use pagespace_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Revoked or expired device tokens are kept this long for the devices
/// audit trail before deletion.
const DEVICE_TOKEN_RETENTION_DAYS: i64 = 30;

/// Rate-limit buckets untouched for this long are dropped.
const RATE_LIMIT_IDLE_HOURS: i64 = 24;

/// Run the cleanup loop every `interval` until `cancel` fires.
pub async fn run(pool: DbPool, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Auth cleanup job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Auth cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                run_once(&pool).await;
            }
        }
    }
}

/// One cleanup pass. Failures are logged and retried on the next tick.
pub async fn run_once(pool: &DbPool) {
    let now = Utc::now();

    match RefreshTokenRepo::delete_expired(pool).await {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(deleted, "Auth cleanup: purged expired refresh tokens"),
        Err(e) => tracing::error!(error = %e, "Auth cleanup: refresh token purge failed"),
    }

    let device_cutoff = now - chrono::Duration::days(DEVICE_TOKEN_RETENTION_DAYS);
    match DeviceTokenRepo::delete_stale(pool, device_cutoff).await {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(deleted, "Auth cleanup: purged stale device tokens"),
        Err(e) => tracing::error!(error = %e, "Auth cleanup: device token purge failed"),
    }

    match ExchangeCodeRepo::delete_spent(pool).await {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(deleted, "Auth cleanup: purged spent exchange codes"),
        Err(e) => tracing::error!(error = %e, "Auth cleanup: exchange code purge failed"),
    }

    let bucket_cutoff = now - chrono::Duration::hours(RATE_LIMIT_IDLE_HOURS);
    match RateLimitRepo::delete_idle(pool, bucket_cutoff).await {
        Ok(0) => tracing::debug!("Auth cleanup: no idle rate-limit buckets"),
        Ok(deleted) => tracing::info!(deleted, "Auth cleanup: purged idle rate-limit buckets"),
        Err(e) => tracing::error!(error = %e, "Auth cleanup: rate-limit purge failed"),
    }
}
