//! `Origin` check for endpoints that set session cookies.
//!
//! Browsers always send `Origin` on cross-site POSTs. Requests without the
//! header come from non-browser clients and are let through.

use axum::http::header::ORIGIN;
use axum::http::HeaderMap;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

pub fn verify_origin(headers: &HeaderMap, config: &ServerConfig) -> AppResult<()> {
    let Some(origin) = headers.get(ORIGIN) else {
        return Ok(());
    };
    let origin = origin
        .to_str()
        .map_err(|_| AppError::forbidden("Origin not allowed"))?;
    if config.is_allowed_origin(origin) {
        Ok(())
    } else {
        tracing::warn!(origin, "Rejected request from disallowed origin");
        Err(AppError::forbidden("Origin not allowed"))
    }
}
