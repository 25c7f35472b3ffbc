//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{auth, devices, oauth};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// GET  /login-csrf             -> login_csrf
/// POST /signup                 -> signup
/// POST /login                  -> login
/// POST /refresh                -> refresh
/// POST /logout                 -> logout
/// GET  /me                     -> me (requires auth)
/// GET  /csrf                   -> csrf (requires auth)
/// POST /sessions/revoke-all    -> revoke_all_sessions (requires auth)
/// POST /password               -> change_password (requires auth)
/// POST /device/refresh         -> device_refresh
/// POST /desktop/exchange       -> desktop_exchange
/// GET  /google/signin          -> google_signin
/// GET  /google/callback        -> google_callback
/// POST /google/native          -> google_native
/// GET  /apple/signin           -> apple_signin
/// POST /apple/callback         -> apple_callback
/// POST /apple/native           -> apple_native
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login-csrf", get(auth::login_csrf))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/csrf", get(auth::csrf))
        .route("/sessions/revoke-all", post(auth::revoke_all_sessions))
        .route("/password", post(auth::change_password))
        .route("/device/refresh", post(devices::device_refresh))
        .route("/desktop/exchange", post(devices::desktop_exchange))
        .route("/google/signin", get(oauth::google_signin))
        .route("/google/callback", get(oauth::google_callback))
        .route("/google/native", post(oauth::google_native))
        .route("/apple/signin", get(oauth::apple_signin))
        .route("/apple/callback", post(oauth::apple_callback))
        .route("/apple/native", post(oauth::apple_native))
}
