//! Identity provider client.
//!
//! Handlers talk to providers only through [`OAuthGateway`], so tests can
//! swap in a stub that returns canned identities.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use pagespace_core::platform::AuthProvider;
use serde::{Deserialize, Deserializer};

use super::jwks::{JwksCache, JWKS_TTL};
use super::providers::{
    APPLE_ISSUERS, APPLE_JWKS_URL, GOOGLE_ISSUERS, GOOGLE_JWKS_URL, GOOGLE_TOKEN_URL,
};
use crate::config::GoogleOAuthConfig;

/// Timeout for every request to a provider.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected the request: {0}")]
    Provider(String),

    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    #[error("OAuth misconfigured: {0}")]
    Config(String),
}

/// Identity asserted by a verified provider ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: AuthProvider,
    /// Provider subject id (`sub`).
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait OAuthGateway: Send + Sync {
    /// Exchange a Google authorization code for an ID token.
    async fn exchange_google_code(
        &self,
        config: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<String, OAuthError>;

    /// Verify a Google or Apple ID token against the provider's keys and
    /// the accepted `audiences`.
    async fn verify_id_token(
        &self,
        provider: AuthProvider,
        id_token: &str,
        audiences: &[String],
    ) -> Result<VerifiedIdentity, OAuthError>;
}

/// Production gateway backed by `reqwest`.
pub struct HttpOAuthGateway {
    client: reqwest::Client,
    jwks: JwksCache,
}

impl HttpOAuthGateway {
    pub fn new() -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;
        Ok(Self {
            jwks: JwksCache::new(client.clone(), JWKS_TTL),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    id_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Apple sends `email_verified` as the string `"true"`, Google as a bool.
fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.eq_ignore_ascii_case("true"),
        None => false,
    })
}

#[async_trait]
impl OAuthGateway for HttpOAuthGateway {
    async fn exchange_google_code(
        &self,
        config: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<String, OAuthError> {
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: GoogleTokenResponse = response.json().await?;
        if !status.is_success() {
            let reason = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| status.to_string());
            return Err(OAuthError::Provider(reason));
        }
        body.id_token
            .ok_or_else(|| OAuthError::Provider("Token response has no id_token".into()))
    }

    async fn verify_id_token(
        &self,
        provider: AuthProvider,
        id_token: &str,
        audiences: &[String],
    ) -> Result<VerifiedIdentity, OAuthError> {
        let (jwks_url, issuers) = match provider {
            AuthProvider::Google => (GOOGLE_JWKS_URL, GOOGLE_ISSUERS),
            AuthProvider::Apple => (APPLE_JWKS_URL, APPLE_ISSUERS),
            AuthProvider::Email => {
                return Err(OAuthError::Config("Email is not an identity provider".into()))
            }
        };
        if audiences.is_empty() {
            return Err(OAuthError::Config("No accepted audiences".into()));
        }

        let header =
            decode_header(id_token).map_err(|e| OAuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OAuthError::InvalidToken("Token header has no kid".into()))?;
        let key = self.jwks.decoding_key(jwks_url, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(audiences);
        validation.set_issuer(issuers);

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| OAuthError::InvalidToken(e.to_string()))?
            .claims;

        Ok(VerifiedIdentity {
            provider,
            subject: claims.sub,
            email: claims.email.map(|e| e.trim().to_lowercase()),
            email_verified: claims.email_verified,
            name: claims.name,
            picture: claims.picture,
        })
    }
}
