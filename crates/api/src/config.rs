use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// Also the allow-list for the `Origin` check on cookie-setting endpoints.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the listener closes.
    pub shutdown_timeout_secs: u64,
    /// Interval of the expired-credential cleanup job (default: `3600`).
    pub cleanup_interval_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Cookie, CSRF and redirect settings.
    pub auth: AuthConfig,
    /// Identity providers. Each is `None` when not configured.
    pub oauth: OAuthConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `3000`                     |
    /// | `CORS_ORIGINS`               | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                       |
    /// | `AUTH_CLEANUP_INTERVAL_SECS` | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let cleanup_interval_secs: u64 = std::env::var("AUTH_CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("AUTH_CLEANUP_INTERVAL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            cleanup_interval_secs,
            jwt: JwtConfig::from_env(),
            auth: AuthConfig::from_env(),
            oauth: OAuthConfig::from_env(),
        }
    }

    /// The web app URL plus `CORS_ORIGINS`, without trailing slashes.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.auth.web_app_url.trim_end_matches('/').to_string()];
        for origin in &self.cors_origins {
            let origin = origin.trim_end_matches('/');
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }

    /// `true` if `origin` may call cookie-setting endpoints.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins().iter().any(|o| o == origin)
    }
}

/// Cookie, CSRF and redirect settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for CSRF tokens and OAuth state.
    pub csrf_secret: String,
    /// Mark auth cookies `Secure` (default: `true`).
    pub cookie_secure: bool,
    /// Public URL of the web app, used for post-login redirects.
    pub web_app_url: String,
    /// Deep link the desktop app listens on for exchange codes.
    pub desktop_redirect_uri: String,
    /// Lifetime of a device token in days (default: `90`).
    pub device_token_expiry_days: i64,
}

impl AuthConfig {
    /// | Env Var                          | Required | Default                       |
    /// |----------------------------------|----------|-------------------------------|
    /// | `CSRF_SECRET`                    | **yes**  | --                            |
    /// | `COOKIE_SECURE`                  | no       | `true`                        |
    /// | `WEB_APP_URL`                    | no       | `http://localhost:3000`       |
    /// | `DESKTOP_REDIRECT_URI`           | no       | `pagespace://auth-exchange`   |
    /// | `DEVICE_TOKEN_EXPIRY_DAYS`       | no       | `90`                          |
    ///
    /// # Panics
    ///
    /// Panics if `CSRF_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let csrf_secret =
            std::env::var("CSRF_SECRET").expect("CSRF_SECRET must be set in the environment");
        assert!(!csrf_secret.is_empty(), "CSRF_SECRET must not be empty");

        let cookie_secure: bool = std::env::var("COOKIE_SECURE")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("COOKIE_SECURE must be true or false");

        let device_token_expiry_days: i64 = std::env::var("DEVICE_TOKEN_EXPIRY_DAYS")
            .unwrap_or_else(|_| "90".into())
            .parse()
            .expect("DEVICE_TOKEN_EXPIRY_DAYS must be a valid i64");

        Self {
            csrf_secret,
            cookie_secure,
            web_app_url: std::env::var("WEB_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            desktop_redirect_uri: std::env::var("DESKTOP_REDIRECT_URI")
                .unwrap_or_else(|_| "pagespace://auth-exchange".into()),
            device_token_expiry_days,
        }
    }
}

/// Configured identity providers.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<GoogleOAuthConfig>,
    pub apple: Option<AppleOAuthConfig>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback registered with Google for the web flow.
    pub redirect_uri: String,
    /// iOS / Android client ids accepted as ID token audiences.
    pub native_client_ids: Vec<String>,
}

impl GoogleOAuthConfig {
    /// Every audience a Google ID token may be issued for.
    pub fn audiences(&self) -> Vec<String> {
        std::iter::once(self.client_id.clone())
            .chain(self.native_client_ids.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct AppleOAuthConfig {
    /// Services id used as `client_id` on the web.
    pub service_id: String,
    pub redirect_uri: String,
    /// App bundle ids accepted as audiences for native sign-in.
    pub bundle_ids: Vec<String>,
}

impl AppleOAuthConfig {
    pub fn audiences(&self) -> Vec<String> {
        std::iter::once(self.service_id.clone())
            .chain(self.bundle_ids.iter().cloned())
            .collect()
    }
}

impl OAuthConfig {
    /// A provider is enabled when its client id is set.
    ///
    /// | Env Var                         | Required with provider |
    /// |---------------------------------|------------------------|
    /// | `GOOGLE_OAUTH_CLIENT_ID`        | enables Google         |
    /// | `GOOGLE_OAUTH_CLIENT_SECRET`    | yes                    |
    /// | `GOOGLE_OAUTH_REDIRECT_URI`     | yes                    |
    /// | `GOOGLE_OAUTH_NATIVE_CLIENT_IDS`| no (comma-separated)   |
    /// | `APPLE_SERVICE_ID`              | enables Apple          |
    /// | `APPLE_REDIRECT_URI`            | yes                    |
    /// | `APPLE_BUNDLE_IDS`              | no (comma-separated)   |
    pub fn from_env() -> Self {
        let google = std::env::var("GOOGLE_OAUTH_CLIENT_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .map(|client_id| GoogleOAuthConfig {
                client_id,
                client_secret: std::env::var("GOOGLE_OAUTH_CLIENT_SECRET")
                    .expect("GOOGLE_OAUTH_CLIENT_SECRET must be set when Google is enabled"),
                redirect_uri: std::env::var("GOOGLE_OAUTH_REDIRECT_URI")
                    .expect("GOOGLE_OAUTH_REDIRECT_URI must be set when Google is enabled"),
                native_client_ids: split_list(
                    &std::env::var("GOOGLE_OAUTH_NATIVE_CLIENT_IDS").unwrap_or_default(),
                ),
            });

        let apple = std::env::var("APPLE_SERVICE_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .map(|service_id| AppleOAuthConfig {
                service_id,
                redirect_uri: std::env::var("APPLE_REDIRECT_URI")
                    .expect("APPLE_REDIRECT_URI must be set when Apple is enabled"),
                bundle_ids: split_list(&std::env::var("APPLE_BUNDLE_IDS").unwrap_or_default()),
            });

        Self { google, apple }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
