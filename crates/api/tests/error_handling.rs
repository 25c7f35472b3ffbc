//! Tests for `AppError` → HTTP response mapping, plus rate-limit responses
//! end to end.

mod common;

use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{body_json, post_json};
use http_body_util::BodyExt;
use pagespace_api::error::AppError;
use pagespace_core::error::CoreError;
use sqlx::PgPool;

/// Convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Device",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Device with id 42 not found");
}

#[tokio::test]
async fn unauthorized_error_returns_401() {
    let (status, json) = error_to_response(AppError::unauthorized("Session has been revoked")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Session has been revoked");
}

#[tokio::test]
async fn csrf_error_returns_403_with_dedicated_code() {
    let (status, json) = error_to_response(AppError::CsrfInvalid("Missing CSRF token".into())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "CSRF_INVALID");
}

#[tokio::test]
async fn rate_limited_error_sets_retry_after() {
    let response = AppError::Core(CoreError::RateLimited {
        retry_after_secs: 90,
    })
    .into_response();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "90");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("jwt secret leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn row_not_found_maps_to_404() {
    let (status, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

/// The sixth login from one IP inside the window is blocked with 429.
#[sqlx::test(migrations = "../../db/migrations")]
async fn login_rate_limit_returns_429(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = serde_json::json!({
        "email": "nobody@example.com",
        "password": "Wrong-Password-1",
        "platform": "desktop",
    });

    for _ in 0..5 {
        let response = post_json(app.clone(), "/api/v1/auth/login", body.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: i64 = response
        .headers()
        .get(RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0);
    assert_eq!(body_json(response).await["code"], "RATE_LIMITED");
}

/// Separate client IPs have separate signup buckets.
#[sqlx::test(migrations = "../../db/migrations")]
async fn signup_rate_limit_is_per_ip(pool: PgPool) {
    let app = common::build_test_app(pool);
    let body = |email: &str| {
        serde_json::json!({
            "name": "Rate Limited",
            "email": email,
            "password": "short",
            "confirm_password": "short",
            "accepted_tos": true,
            "platform": "desktop",
        })
    };

    for i in 0..3 {
        let response = common::post_json_with_headers(
            app.clone(),
            "/api/v1/auth/signup",
            body(&format!("u{i}@example.com")),
            &[("x-forwarded-for", "203.0.113.7")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let blocked = common::post_json_with_headers(
        app.clone(),
        "/api/v1/auth/signup",
        body("u4@example.com"),
        &[("x-forwarded-for", "203.0.113.7")],
    )
    .await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_ip = common::post_json_with_headers(
        app,
        "/api/v1/auth/signup",
        body("u5@example.com"),
        &[("x-forwarded-for", "198.51.100.1, 10.0.0.1")],
    )
    .await;
    assert_eq!(other_ip.status(), StatusCode::BAD_REQUEST);
}
