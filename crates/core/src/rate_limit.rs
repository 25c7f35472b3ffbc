//! Fixed-window rate-limit policies and the pure bucket state machine.
//!
//! The repository layer persists [`BucketState`] rows and calls [`evaluate`]
//! while holding a row lock, so every instance of the service shares the
//! same counters.

use chrono::Duration;

use crate::types::Timestamp;

/// Limits for one class of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Prefix for bucket keys, also used in log fields.
    pub name: &'static str,
    /// Attempts allowed inside one window. The next one is blocked.
    pub max_attempts: i32,
    pub window_secs: i64,
    /// How long a bucket stays blocked once the limit is exceeded.
    pub block_secs: i64,
}

pub const LOGIN: RateLimitPolicy = RateLimitPolicy {
    name: "login",
    max_attempts: 5,
    window_secs: 15 * 60,
    block_secs: 15 * 60,
};

pub const SIGNUP: RateLimitPolicy = RateLimitPolicy {
    name: "signup",
    max_attempts: 3,
    window_secs: 60 * 60,
    block_secs: 60 * 60,
};

pub const REFRESH: RateLimitPolicy = RateLimitPolicy {
    name: "refresh",
    max_attempts: 10,
    window_secs: 5 * 60,
    block_secs: 5 * 60,
};

pub const OAUTH: RateLimitPolicy = RateLimitPolicy {
    name: "oauth",
    max_attempts: 10,
    window_secs: 15 * 60,
    block_secs: 15 * 60,
};

pub const DEVICE_REFRESH: RateLimitPolicy = RateLimitPolicy {
    name: "device",
    max_attempts: 10,
    window_secs: 5 * 60,
    block_secs: 5 * 60,
};

pub const PASSWORD_CHANGE: RateLimitPolicy = RateLimitPolicy {
    name: "password",
    max_attempts: 5,
    window_secs: 15 * 60,
    block_secs: 15 * 60,
};

impl RateLimitPolicy {
    /// Build the bucket key for `identifier` (an IP, email, user id, ...).
    ///
    /// Identifiers are lower-cased so `Foo@x.com` and `foo@x.com` share a bucket.
    pub fn key(&self, kind: &str, identifier: &str) -> String {
        format!("{}:{kind}:{}", self.name, identifier.trim().to_lowercase())
    }
}

/// Persisted counter for one bucket key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketState {
    pub attempts: i32,
    pub window_start: Timestamp,
    pub blocked_until: Option<Timestamp>,
}

/// Outcome of counting one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: i32 },
    Blocked { retry_after_secs: i64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Count one attempt against `current` and return the state to persist.
///
/// Attempts made while a bucket is blocked are not counted, so a client
/// hammering a blocked endpoint does not extend its own block.
pub fn evaluate(
    current: Option<&BucketState>,
    policy: &RateLimitPolicy,
    now: Timestamp,
) -> (BucketState, RateLimitDecision) {
    if let Some(state) = current {
        if let Some(until) = state.blocked_until {
            if until > now {
                return (
                    state.clone(),
                    RateLimitDecision::Blocked {
                        retry_after_secs: seconds_until(until, now),
                    },
                );
            }
        }
    }

    let window = Duration::seconds(policy.window_secs);
    let previous = match current {
        Some(state) if state.blocked_until.is_none() && now - state.window_start < window => state,
        // No bucket yet, window elapsed, or a block that has lapsed.
        _ => {
            let state = BucketState {
                attempts: 1,
                window_start: now,
                blocked_until: None,
            };
            let remaining = (policy.max_attempts - 1).max(0);
            return (state, RateLimitDecision::Allowed { remaining });
        }
    };

    let attempts = previous.attempts + 1;

    if attempts > policy.max_attempts {
        let until = now + Duration::seconds(policy.block_secs);
        let state = BucketState {
            attempts,
            window_start: previous.window_start,
            blocked_until: Some(until),
        };
        return (
            state,
            RateLimitDecision::Blocked {
                retry_after_secs: policy.block_secs.max(1),
            },
        );
    }

    let state = BucketState {
        attempts,
        window_start: previous.window_start,
        blocked_until: None,
    };
    (
        state,
        RateLimitDecision::Allowed {
            remaining: policy.max_attempts - attempts,
        },
    )
}

/// Whole seconds until `until`, rounded up and never below 1.
fn seconds_until(until: Timestamp, now: Timestamp) -> i64 {
    let millis = (until - now).num_milliseconds();
    ((millis + 999) / 1000).max(1)
}
