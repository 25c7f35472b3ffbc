//! Client metadata extractor.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Used as the rate-limit identifier when no address header is present.
pub const UNKNOWN_IP: &str = "unknown";

const MAX_USER_AGENT_LEN: usize = 512;

/// Caller IP and user agent, as reported by the reverse proxy.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip: client_ip(headers),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect()),
        }
    }

    /// The IP for storage, `None` when unknown.
    pub fn ip_address(&self) -> Option<String> {
        (self.ip != UNKNOWN_IP).then(|| self.ip.clone())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then [`UNKNOWN_IP`].
fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}
