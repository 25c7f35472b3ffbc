//! Rate-limit bucket rows.

use pagespace_core::rate_limit::BucketState;
use pagespace_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `rate_limit_buckets` table.
#[derive(Debug, Clone, FromRow)]
pub struct RateLimitBucket {
    pub key: String,
    pub attempts: i32,
    pub window_start: Timestamp,
    pub blocked_until: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl RateLimitBucket {
    /// Convert to the core state, treating a zero-attempt placeholder as absent.
    pub fn to_state(&self) -> Option<BucketState> {
        if self.attempts == 0 {
            return None;
        }
        Some(BucketState {
            attempts: self.attempts,
            window_start: self.window_start,
            blocked_until: self.blocked_until,
        })
    }
}
