//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus the create DTO used for inserts.

pub mod device_token;
pub mod exchange_code;
pub mod rate_limit;
pub mod refresh_token;
pub mod user;
