//! HTTP-level integration tests for signup, login, lockout, CSRF and
//! password changes.

mod common;

use axum::http::header::COOKIE;
use axum::http::StatusCode;
use common::{
    body_json, create_user, desktop_login, get, get_auth, login_csrf, post_json,
    post_json_auth, post_json_with_headers, set_cookie_header, set_cookie_value, web_login,
    DEVICE_ID, TEST_PASSWORD,
};
use pagespace_db::repositories::UserRepo;
use sqlx::PgPool;

fn signup_body(email: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Ada Lovelace",
        "email": email,
        "password": TEST_PASSWORD,
        "confirm_password": TEST_PASSWORD,
        "accepted_tos": true,
    })
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

/// Web signup returns 201, sets session cookies and keeps tokens out of the body.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_web_signup_sets_cookies(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (token, cookie) = login_csrf(app.clone()).await;

    let response = post_json_with_headers(
        app,
        "/api/v1/auth/signup",
        signup_body("Ada@Example.com"),
        &[("x-login-csrf-token", token.as_str()), (COOKIE.as_str(), cookie.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let access = set_cookie_header(&response, "accessToken").expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Strict"));
    assert!(access.contains("Path=/"));
    assert!(set_cookie_value(&response, "refreshToken").is_some());

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "ada@example.com");
    assert_eq!(json["user"]["has_password"], true);
    assert!(json["csrf_token"].is_string());
    assert!(json.get("access_token").is_none(), "web body must not carry tokens");
    assert!(json.get("refresh_token").is_none());

    let user = UserRepo::find_by_email(&pool, "ada@example.com").await.unwrap();
    assert!(user.is_some());
}

/// Desktop signup returns tokens and a device token in the body, no cookies.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_desktop_signup_returns_tokens(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = signup_body("desk@example.com");
    body["platform"] = "desktop".into();
    body["device_id"] = DEVICE_ID.into();

    let response = post_json(app, "/api/v1/auth/signup", body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(set_cookie_value(&response, "accessToken").is_none());
    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert!(json["device_token"].as_str().unwrap().starts_with("dev_"));
}

/// Signing up twice with the same email returns 409.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_duplicate_email(pool: PgPool) {
    create_user(&pool, "taken@example.com").await;
    let app = common::build_test_app(pool);
    let mut body = signup_body("TAKEN@example.com");
    body["platform"] = "desktop".into();

    let response = post_json(app, "/api/v1/auth/signup", body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_validation_errors(pool: PgPool) {
    let app = common::build_test_app(pool);

    let mut mismatch = signup_body("a@example.com");
    mismatch["platform"] = "desktop".into();
    mismatch["confirm_password"] = "Different-Pass-99".into();
    let response = post_json(app.clone(), "/api/v1/auth/signup", mismatch).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Passwords do not match");

    let mut weak = signup_body("b@example.com");
    weak["platform"] = "desktop".into();
    weak["password"] = "short".into();
    weak["confirm_password"] = "short".into();
    let response = post_json(app.clone(), "/api/v1/auth/signup", weak).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut no_tos = signup_body("c@example.com");
    no_tos["platform"] = "desktop".into();
    no_tos["accepted_tos"] = false.into();
    let response = post_json(app, "/api/v1/auth/signup", no_tos).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Web signup without the login CSRF pair is rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_web_signup_requires_login_csrf(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app, "/api/v1/auth/signup", signup_body("x@example.com")).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CSRF_INVALID");
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_desktop_login_success(pool: PgPool) {
    let user = create_user(&pool, "login@example.com").await;
    let app = common::build_test_app(pool);

    let json = desktop_login(app, "LOGIN@example.com").await;

    assert_eq!(json["user"]["id"], user.id);
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert!(json["device_token"].is_string());
    assert_eq!(json["expires_in"], 15 * 60);
}

/// Wrong passwords and unknown emails get the same 401.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_failures_are_indistinguishable(pool: PgPool) {
    create_user(&pool, "known@example.com").await;
    let app = common::build_test_app(pool);

    let wrong = post_json(
        app.clone(),
        "/api/v1/auth/login",
        serde_json::json!({ "email": "known@example.com", "password": "Wrong-Password-1", "platform": "desktop" }),
    )
    .await;
    let unknown = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "ghost@example.com", "password": "Wrong-Password-1", "platform": "desktop" }),
    )
    .await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;
    let unknown = body_json(unknown).await;
    assert_eq!(wrong["error"], unknown["error"]);
    assert_eq!(wrong["error"], "Invalid email or password");
}

/// The tenth consecutive failure locks the account, even for the right password.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_account_lockout(pool: PgPool) {
    let user = create_user(&pool, "lock@example.com").await;
    sqlx::query("UPDATE users SET failed_login_count = 9 WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    let app = common::build_test_app(pool.clone());

    let response = post_json(
        app.clone(),
        "/api/v1/auth/login",
        serde_json::json!({ "email": "lock@example.com", "password": "Wrong-Password-1", "platform": "desktop" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "lock@example.com", "password": TEST_PASSWORD, "platform": "desktop" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("locked"));

    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(user.locked_until.is_some());
    assert_eq!(user.failed_login_count, 0);
}

/// Once a lock lapses, a single wrong password does not lock the account again.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lapsed_lock_starts_fresh(pool: PgPool) {
    let user = create_user(&pool, "relock@example.com").await;
    sqlx::query("UPDATE users SET failed_login_count = 9 WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    let app = common::build_test_app(pool.clone());
    let wrong = serde_json::json!({ "email": "relock@example.com", "password": "Wrong-Password-1", "platform": "desktop" });

    let response = post_json(app.clone(), "/api/v1/auth/login", wrong.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    sqlx::query("UPDATE users SET locked_until = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(app.clone(), "/api/v1/auth/login", wrong).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "relock@example.com", "password": TEST_PASSWORD, "platform": "desktop" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_inactive_user(pool: PgPool) {
    let user = create_user(&pool, "gone@example.com").await;
    UserRepo::deactivate(&pool, user.id).await.unwrap();
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "gone@example.com", "password": TEST_PASSWORD, "platform": "desktop" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// A mismatched login CSRF header and cookie is rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_web_login_csrf_mismatch(pool: PgPool) {
    create_user(&pool, "csrf@example.com").await;
    let app = common::build_test_app(pool);
    let (_token, cookie) = login_csrf(app.clone()).await;
    let (other_token, _) = login_csrf(app.clone()).await;

    let response = post_json_with_headers(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "csrf@example.com", "password": TEST_PASSWORD }),
        &[("x-login-csrf-token", other_token.as_str()), (COOKIE.as_str(), cookie.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Requests from an origin outside the allow-list are rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_rejects_foreign_origin(pool: PgPool) {
    create_user(&pool, "origin@example.com").await;
    let app = common::build_test_app(pool);

    let response = post_json_with_headers(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "origin@example.com", "password": TEST_PASSWORD, "platform": "desktop" }),
        &[("origin", "https://evil.example")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Session endpoints
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_me_requires_auth(pool: PgPool) {
    let user = create_user(&pool, "me@example.com").await;
    let app = common::build_test_app(pool);

    let response = get(app.clone(), "/api/v1/auth/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let login = desktop_login(app.clone(), "me@example.com").await;
    let token = login["access_token"].as_str().unwrap();
    let response = get_auth(app, "/api/v1/auth/me", token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], user.id);
    assert!(json.get("password_hash").is_none());
}

/// Cookie sessions need the CSRF header on unsafe requests.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cookie_session_requires_csrf_header(pool: PgPool) {
    create_user(&pool, "cookie@example.com").await;
    let app = common::build_test_app(pool);

    let response = web_login(app.clone(), "cookie@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let access = set_cookie_value(&response, "accessToken").unwrap();
    let csrf = body_json(response).await["csrf_token"]
        .as_str()
        .unwrap()
        .to_string();
    let cookie = format!("accessToken={access}");

    let me = common::send(
        app.clone(),
        axum::http::Request::get("/api/v1/auth/me")
            .header(COOKIE, &cookie)
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(me.status(), StatusCode::OK);

    let without = common::post_empty(
        app.clone(),
        "/api/v1/auth/sessions/revoke-all",
        &[(COOKIE.as_str(), cookie.as_str())],
    )
    .await;
    assert_eq!(without.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(without).await["code"], "CSRF_INVALID");

    let with = common::post_empty(
        app.clone(),
        "/api/v1/auth/sessions/revoke-all",
        &[(COOKIE.as_str(), cookie.as_str()), ("x-csrf-token", csrf.as_str())],
    )
    .await;
    assert_eq!(with.status(), StatusCode::NO_CONTENT);

    // The access token is dead now that the token version moved.
    let me = common::send(
        app,
        axum::http::Request::get("/api/v1/auth/me")
            .header(COOKIE, &cookie)
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_session_csrf_endpoint(pool: PgPool) {
    create_user(&pool, "token@example.com").await;
    let app = common::build_test_app(pool);
    let login = desktop_login(app.clone(), "token@example.com").await;
    let token = login["access_token"].as_str().unwrap();

    let response = get_auth(app, "/api/v1/auth/csrf", token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["csrf_token"].as_str().unwrap().split('.').count(), 3);
}

/// Changing the password revokes old tokens and returns a new session.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_change_password(pool: PgPool) {
    create_user(&pool, "pw@example.com").await;
    let app = common::build_test_app(pool);
    let login = desktop_login(app.clone(), "pw@example.com").await;
    let old_access = login["access_token"].as_str().unwrap().to_string();

    let wrong = post_json_auth(
        app.clone(),
        "/api/v1/auth/password",
        serde_json::json!({ "current_password": "Not-The-Password-1", "new_password": "Brand-New-Pass-77" }),
        &old_access,
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/auth/password",
        serde_json::json!({ "current_password": TEST_PASSWORD, "new_password": "Brand-New-Pass-77" }),
        &old_access,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let new_access = json["access_token"].as_str().unwrap().to_string();

    let response = get_auth(app.clone(), "/api/v1/auth/me", &old_access).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = get_auth(app.clone(), "/api/v1/auth/me", &new_access).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        serde_json::json!({ "email": "pw@example.com", "password": "Brand-New-Pass-77", "platform": "desktop" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Logout returns 204 and expires the session cookies.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_logout_clears_cookies(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = common::post_empty(app, "/api/v1/auth/logout", &[]).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = set_cookie_header(&response, "accessToken").unwrap();
    assert!(cleared.contains("Max-Age=0"));
}
