//! Session cookies for the web platform.
//!
//! Access and refresh tokens are `HttpOnly`, `SameSite=Strict` cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::ServerConfig;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const LOGIN_CSRF_COOKIE: &str = "login_csrf";

/// Add both session cookies to `jar`.
pub fn with_session_cookies(
    jar: CookieJar,
    access_token: &str,
    refresh_token: &str,
    config: &ServerConfig,
) -> CookieJar {
    let access_max_age = config.jwt.access_token_expiry_mins * 60;
    let refresh_max_age = config.jwt.refresh_token_expiry_days * 24 * 60 * 60;
    jar.add(build_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token.to_string(),
        access_max_age,
        config.auth.cookie_secure,
    ))
    .add(build_cookie(
        REFRESH_TOKEN_COOKIE,
        refresh_token.to_string(),
        refresh_max_age,
        config.auth.cookie_secure,
    ))
}

/// Expire both session cookies.
pub fn without_session_cookies(jar: CookieJar, config: &ServerConfig) -> CookieJar {
    jar.add(build_cookie(
        ACCESS_TOKEN_COOKIE,
        String::new(),
        0,
        config.auth.cookie_secure,
    ))
    .add(build_cookie(
        REFRESH_TOKEN_COOKIE,
        String::new(),
        0,
        config.auth.cookie_secure,
    ))
}

/// Set the double-submit login CSRF cookie.
pub fn with_login_csrf_cookie(jar: CookieJar, token: &str, config: &ServerConfig) -> CookieJar {
    jar.add(build_cookie(
        LOGIN_CSRF_COOKIE,
        token.to_string(),
        pagespace_core::csrf::LOGIN_CSRF_MAX_AGE_SECS,
        config.auth.cookie_secure,
    ))
}

fn build_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}
