use std::sync::Arc;

use crate::config::ServerConfig;
use crate::oauth::OAuthGateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: pagespace_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Identity provider client (token exchange and ID token verification).
    pub oauth: Arc<dyn OAuthGateway>,
}
