//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-statement operations run in
//! a single transaction inside the repository.

pub mod device_token_repo;
pub mod exchange_code_repo;
pub mod rate_limit_repo;
pub mod refresh_token_repo;
pub mod session_repo;
pub mod user_repo;

pub use device_token_repo::DeviceTokenRepo;
pub use exchange_code_repo::ExchangeCodeRepo;
pub use rate_limit_repo::RateLimitRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
