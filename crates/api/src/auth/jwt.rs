//! JWT access and refresh token generation and validation.
//!
//! Both token kinds are HS256-signed JWTs carrying the user's token version
//! (`tv`). Bumping `users.token_version` invalidates every outstanding token
//! at once. Refresh tokens are additionally stored server-side by SHA-256
//! hash so they can be rotated and revoked one by one.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pagespace_core::hashing::sha256_hex;
use pagespace_core::platform::Platform;
use pagespace_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Token version of the user at issue time.
    pub tv: i32,
    /// The user's role name (e.g. `"admin"`, `"user"`).
    pub role: String,
    /// `"access"` or `"refresh"`.
    pub typ: String,
    /// Client platform the session was issued to.
    pub platform: Platform,
    pub iss: String,
    pub aud: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4). Also keeps two refresh tokens
    /// minted in the same second distinct.
    pub jti: String,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Web refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
    /// Desktop and mobile refresh token lifetime in days (default: 30).
    pub native_refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;
const DEFAULT_NATIVE_REFRESH_EXPIRY_DAYS: i64 = 30;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                           | Required | Default     |
    /// |-----------------------------------|----------|-------------|
    /// | `JWT_SECRET`                      | **yes**  | --          |
    /// | `JWT_ISSUER`                      | no       | `pagespace` |
    /// | `JWT_AUDIENCE`                    | no       | `pagespace` |
    /// | `JWT_ACCESS_EXPIRY_MINS`          | no       | `15`        |
    /// | `JWT_REFRESH_EXPIRY_DAYS`         | no       | `7`         |
    /// | `JWT_DEVICE_REFRESH_EXPIRY_DAYS`  | no       | `30`        |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is shorter than 32 bytes.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(secret.len() >= 32, "JWT_SECRET must be at least 32 bytes");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        let native_refresh_token_expiry_days: i64 =
            std::env::var("JWT_DEVICE_REFRESH_EXPIRY_DAYS")
                .unwrap_or_else(|_| DEFAULT_NATIVE_REFRESH_EXPIRY_DAYS.to_string())
                .parse()
                .expect("JWT_DEVICE_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pagespace".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "pagespace".into()),
            access_token_expiry_mins,
            refresh_token_expiry_days,
            native_refresh_token_expiry_days,
        }
    }

    /// Refresh token lifetime for a platform.
    pub fn refresh_lifetime(&self, platform: Platform) -> Duration {
        if platform.is_native() {
            Duration::days(self.native_refresh_token_expiry_days)
        } else {
            Duration::days(self.refresh_token_expiry_days)
        }
    }
}

/// A freshly minted refresh token.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Sent to the client, never stored.
    pub token: String,
    /// SHA-256 hex digest persisted in `refresh_tokens`.
    pub hash: String,
    pub expires_at: Timestamp,
}

/// Generate an HS256 access token for the given user.
pub fn generate_access_token(
    user_id: DbId,
    token_version: i32,
    role: &str,
    platform: Platform,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let exp = now + config.access_token_expiry_mins * 60;
    sign(
        &build_claims(user_id, token_version, role, platform, TOKEN_TYPE_ACCESS, now, exp, config),
        config,
    )
}

/// Generate a refresh token JWT and its storage hash.
pub fn generate_refresh_token(
    user_id: DbId,
    token_version: i32,
    role: &str,
    platform: Platform,
    config: &JwtConfig,
) -> Result<IssuedRefreshToken, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + config.refresh_lifetime(platform);
    let claims = build_claims(
        user_id,
        token_version,
        role,
        platform,
        TOKEN_TYPE_REFRESH,
        now.timestamp(),
        expires_at.timestamp(),
        config,
    );
    let token = sign(&claims, config)?;
    let hash = hash_refresh_token(&token);
    Ok(IssuedRefreshToken {
        token,
        hash,
        expires_at,
    })
}

/// Validate an access token, returning the embedded [`Claims`].
///
/// Validates the signature, expiration, issuer, audience and token type.
pub fn validate_access_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    validate_typed(token, TOKEN_TYPE_ACCESS, config)
}

/// Validate a refresh token JWT. Does not consult the database.
pub fn validate_refresh_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    validate_typed(token, TOKEN_TYPE_REFRESH, config)
}

/// Compute the SHA-256 hex digest of a refresh token.
pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

#[allow(clippy::too_many_arguments)]
fn build_claims(
    user_id: DbId,
    token_version: i32,
    role: &str,
    platform: Platform,
    typ: &str,
    iat: i64,
    exp: i64,
    config: &JwtConfig,
) -> Claims {
    Claims {
        sub: user_id,
        tv: token_version,
        role: role.to_string(),
        typ: typ.to_string(),
        platform,
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        exp,
        iat,
        jti: Uuid::new_v4().to_string(),
    }
}

fn sign(claims: &Claims, config: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

fn validate_typed(
    token: &str,
    expected_type: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    if token_data.claims.typ != expected_type {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build a test config with a known secret.
    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: "pagespace".to_string(),
            audience: "pagespace".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
            native_refresh_token_expiry_days: 30,
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = test_config();
        let token = generate_access_token(42, 3, "admin", Platform::Web, &config)
            .expect("token generation should succeed");

        let claims =
            validate_access_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.tv, 3);
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.typ, TOKEN_TYPE_ACCESS);
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let config = test_config();
        let access = generate_access_token(1, 0, "user", Platform::Web, &config).unwrap();
        let refresh = generate_refresh_token(1, 0, "user", Platform::Web, &config).unwrap();

        assert!(validate_refresh_token(&access, &config).is_err());
        assert!(validate_access_token(&refresh.token, &config).is_err());
        assert!(validate_refresh_token(&refresh.token, &config).is_ok());
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();

        // Use a margin well beyond the default 60-second leeway.
        let now = Utc::now().timestamp();
        let claims = build_claims(
            1,
            0,
            "user",
            Platform::Web,
            TOKEN_TYPE_ACCESS,
            now - 600,
            now - 300,
            &config,
        );
        let token = sign(&claims, &config).expect("encoding should succeed");

        let result = validate_access_token(&token, &config);
        assert!(result.is_err(), "expired token must fail validation");
    }

    #[test]
    fn test_refresh_token_hash_and_lifetime() {
        let config = test_config();
        let web = generate_refresh_token(7, 0, "user", Platform::Web, &config).unwrap();
        let desktop = generate_refresh_token(7, 0, "user", Platform::Desktop, &config).unwrap();

        assert_eq!(web.hash, hash_refresh_token(&web.token));
        assert_eq!(web.hash.len(), 64);
        assert_ne!(web.token, desktop.token);
        assert!(desktop.expires_at - web.expires_at > Duration::days(22));

        let claims = validate_refresh_token(&desktop.token, &config).unwrap();
        assert_eq!(claims.platform, Platform::Desktop);
    }

    #[test]
    fn test_different_secrets_fail() {
        let config_a = test_config();
        let config_b = JwtConfig {
            secret: "another-secret-that-is-long-enough".to_string(),
            ..test_config()
        };

        let token = generate_access_token(1, 0, "user", Platform::Web, &config_a)
            .expect("token generation should succeed");

        let result = validate_access_token(&token, &config_b);
        assert!(
            result.is_err(),
            "token signed with a different secret must fail"
        );
    }

    #[test]
    fn test_wrong_audience_fails() {
        let config = test_config();
        let token = generate_access_token(1, 0, "user", Platform::Web, &config).unwrap();
        let other = JwtConfig {
            audience: "someone-else".to_string(),
            ..test_config()
        };
        assert!(validate_access_token(&token, &other).is_err());
    }
}
