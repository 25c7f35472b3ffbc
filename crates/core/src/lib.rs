//! Pure domain logic for the PageSpace auth service.
//!
//! Nothing in this crate performs I/O. Repositories and HTTP handlers call
//! into it for validation, token signing and rate-limit decisions.

pub mod csrf;
pub mod error;
pub mod hashing;
pub mod oauth_state;
pub mod platform;
pub mod rate_limit;
pub mod return_url;
pub mod roles;
pub mod types;
pub mod validation;
