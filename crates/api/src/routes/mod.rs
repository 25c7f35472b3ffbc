pub mod account;
pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                  service + database health
///
/// /auth/login-csrf                         login CSRF token (public)
/// /auth/signup                             create account (public)
/// /auth/login                              password login (public)
/// /auth/refresh                            rotate refresh token
/// /auth/logout                             end current session
/// /auth/me                                 current user (auth required)
/// /auth/csrf                               session CSRF token (auth required)
/// /auth/sessions/revoke-all                logout everywhere (auth required)
/// /auth/password                           change password (auth required)
/// /auth/device/refresh                     device token -> new session
/// /auth/desktop/exchange                   one-time code -> desktop session
/// /auth/google/signin                      redirect to Google
/// /auth/google/callback                    Google redirect target
/// /auth/google/native                      Google ID token from an app
/// /auth/apple/signin                       redirect to Apple
/// /auth/apple/callback                     Apple form_post target
/// /auth/apple/native                       Apple identity token from an app
///
/// /account/devices                         list devices (auth required)
/// /account/devices/{id}                    revoke one device
/// /account/devices/revoke-others           revoke all but the current device
///
/// /admin/users/{id}/revoke-sessions        force logout (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/account", account::router())
        .nest("/admin", admin::router())
}
