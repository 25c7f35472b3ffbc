#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pagespace_api::auth::jwt::JwtConfig;
use pagespace_api::auth::password::hash_password;
use pagespace_api::config::{
    AppleOAuthConfig, AuthConfig, GoogleOAuthConfig, OAuthConfig, ServerConfig,
};
use pagespace_api::oauth::{OAuthError, OAuthGateway, VerifiedIdentity};
use pagespace_api::router::build_app_router;
use pagespace_api::state::AppState;
use pagespace_core::platform::AuthProvider;
use pagespace_db::models::user::{CreateUser, User};
use pagespace_db::repositories::UserRepo;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "Correct-Horse-42";
pub const DEVICE_ID: &str = "device-0001";
pub const GOOGLE_CLIENT_ID: &str = "google-web-client";
pub const GOOGLE_IOS_CLIENT_ID: &str = "google-ios-client";
pub const APPLE_SERVICE_ID: &str = "ai.pagespace.web";
pub const APPLE_BUNDLE_ID: &str = "ai.pagespace.ios";

/// Build a test `ServerConfig` with both identity providers enabled and
/// non-secure cookies.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        cleanup_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "integration-test-secret-at-least-32-bytes!".to_string(),
            issuer: "pagespace".to_string(),
            audience: "pagespace".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
            native_refresh_token_expiry_days: 30,
        },
        auth: AuthConfig {
            csrf_secret: "integration-test-csrf-secret".to_string(),
            cookie_secure: false,
            web_app_url: "http://localhost:3000".to_string(),
            desktop_redirect_uri: "pagespace://auth-exchange".to_string(),
            device_token_expiry_days: 90,
        },
        oauth: OAuthConfig {
            google: Some(GoogleOAuthConfig {
                client_id: GOOGLE_CLIENT_ID.to_string(),
                client_secret: "google-secret".to_string(),
                redirect_uri: "http://localhost:3000/api/v1/auth/google/callback".to_string(),
                native_client_ids: vec![GOOGLE_IOS_CLIENT_ID.to_string()],
            }),
            apple: Some(AppleOAuthConfig {
                service_id: APPLE_SERVICE_ID.to_string(),
                redirect_uri: "http://localhost:3000/api/v1/auth/apple/callback".to_string(),
                bundle_ids: vec![APPLE_BUNDLE_ID.to_string()],
            }),
        },
    }
}

/// Identity provider stand-in.
///
/// ID tokens are `"<sub>|<email>|<verified>|<aud>"`. A token is rejected
/// when its audience is not among the accepted ones, mirroring the real
/// verifier. Google authorization codes are echoed back as ID tokens.
pub struct StubOAuthGateway;

#[async_trait]
impl OAuthGateway for StubOAuthGateway {
    async fn exchange_google_code(
        &self,
        _config: &GoogleOAuthConfig,
        code: &str,
    ) -> Result<String, OAuthError> {
        if code == "bad-code" {
            return Err(OAuthError::Provider("invalid_grant".into()));
        }
        Ok(code.to_string())
    }

    async fn verify_id_token(
        &self,
        provider: AuthProvider,
        id_token: &str,
        audiences: &[String],
    ) -> Result<VerifiedIdentity, OAuthError> {
        let parts: Vec<&str> = id_token.split('|').collect();
        let [sub, email, verified, aud] = parts.as_slice() else {
            return Err(OAuthError::InvalidToken("malformed".into()));
        };
        if !audiences.iter().any(|a| a == aud) {
            return Err(OAuthError::InvalidToken("audience mismatch".into()));
        }
        Ok(VerifiedIdentity {
            provider,
            subject: sub.to_string(),
            email: (!email.is_empty()).then(|| email.to_lowercase()),
            email_verified: *verified == "true",
            name: None,
            picture: None,
        })
    }
}

/// Stub ID token accepted by [`StubOAuthGateway`].
pub fn stub_id_token(sub: &str, email: &str, verified: bool, aud: &str) -> String {
    format!("{sub}|{email}|{verified}|{aud}")
}

/// Build the full application router over `pool` with the stub gateway.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        oauth: Arc::new(StubOAuthGateway),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_with_headers(app, uri, body, &[]).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let bearer = format!("Bearer {token}");
    post_json_with_headers(app, uri, body, &[(AUTHORIZATION.as_str(), bearer.as_str())]).await
}

pub async fn post_json_with_headers(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn post_empty(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
    let mut builder = Request::post(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

/// Value of the `name` cookie set by `response`, if any.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let pair = raw.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}

/// Full `Set-Cookie` header for `name`, attributes included.
pub fn set_cookie_header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Fetch a login CSRF token. Returns the token and the matching `Cookie`
/// header value.
pub async fn login_csrf(app: Router) -> (String, String) {
    let response = get(app, "/api/v1/auth/login-csrf").await;
    let cookie = set_cookie_value(&response, "login_csrf").expect("login_csrf cookie");
    let json = body_json(response).await;
    let token = json["csrf_token"].as_str().unwrap().to_string();
    assert_eq!(token, cookie);
    (token, format!("login_csrf={cookie}"))
}

/// Web login through the double-submit CSRF flow.
pub async fn web_login(app: Router, email: &str, password: &str) -> Response<Body> {
    let (token, cookie) = login_csrf(app.clone()).await;
    post_json_with_headers(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": email, "password": password }),
        &[("x-login-csrf-token", token.as_str()), (COOKIE.as_str(), cookie.as_str())],
    )
    .await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert an email/password user with [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, email: &str) -> User {
    let input = CreateUser {
        name: "Test User".to_string(),
        email: email.to_string(),
        password_hash: Some(hash_password(TEST_PASSWORD).unwrap()),
        provider: AuthProvider::Email,
        google_id: None,
        apple_id: None,
        image: None,
        email_verified: true,
        tos_accepted: true,
    };
    UserRepo::create(pool, &input).await.unwrap()
}

/// Desktop login; returns the JSON body with tokens.
pub async fn desktop_login(app: Router, email: &str) -> serde_json::Value {
    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({
            "email": email,
            "password": TEST_PASSWORD,
            "platform": "desktop",
            "device_id": DEVICE_ID,
            "device_name": "Test Laptop",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::delete(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
