//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- access and refresh JWT generation and validation.
//! - [`device`] -- opaque device tokens and desktop exchange codes.
//! - [`cookies`] -- web session cookies.
//! - [`session`] -- issuing a complete session for any platform.

pub mod cookies;
pub mod device;
pub mod jwt;
pub mod password;
pub mod session;
