//! Request guards: authentication extractors, CSRF, origin checks and rate limits.

pub mod auth;
pub mod client;
pub mod csrf;
pub mod origin;
pub mod rate_limit;
pub mod rbac;
