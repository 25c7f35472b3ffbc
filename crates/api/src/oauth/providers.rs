//! Provider endpoints and authorization URL builders.

use reqwest::Url;

use super::gateway::OAuthError;
use crate::config::{AppleOAuthConfig, GoogleOAuthConfig};

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

pub const APPLE_AUTHORIZE_URL: &str = "https://appleid.apple.com/auth/authorize";
pub const APPLE_JWKS_URL: &str = "https://appleid.apple.com/auth/keys";
pub const APPLE_ISSUERS: &[&str] = &["https://appleid.apple.com"];

/// Google consent screen URL for the web and desktop flows.
pub fn google_authorize_url(
    config: &GoogleOAuthConfig,
    state: &str,
) -> Result<Url, OAuthError> {
    Url::parse_with_params(
        GOOGLE_AUTHORIZE_URL,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("access_type", "online"),
            ("prompt", "select_account"),
            ("state", state),
        ],
    )
    .map_err(|e| OAuthError::Config(e.to_string()))
}

/// Apple authorization URL. Apple posts the result back as a form.
pub fn apple_authorize_url(
    config: &AppleOAuthConfig,
    state: &str,
) -> Result<Url, OAuthError> {
    Url::parse_with_params(
        APPLE_AUTHORIZE_URL,
        &[
            ("client_id", config.service_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code id_token"),
            ("response_mode", "form_post"),
            ("scope", "name email"),
            ("state", state),
        ],
    )
    .map_err(|e| OAuthError::Config(e.to_string()))
}
