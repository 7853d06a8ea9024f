//! Cookie mirror of the Dropbox credential
//!
//! Centralizes cookie formatting so the callback, refresh and reset
//! endpoints all write the same attributes.

use axum::http::HeaderValue;
use axum_extra::extract::CookieJar;
use chrono::DateTime;

use super::error::{ApiError, LogErr};
use crate::models::Credential;

/// Cookie configuration constants
pub mod config {
    /// Access token cookie name
    pub const ACCESS_TOKEN_NAME: &str = "dropbox_access_token";
    /// Refresh token cookie name
    pub const REFRESH_TOKEN_NAME: &str = "dropbox_refresh_token";
    /// Expiry cookie name, value is unix milliseconds
    pub const TOKEN_EXPIRY_NAME: &str = "dropbox_token_expiry";
    /// Max-age for all credential cookies in seconds (30 days)
    pub const MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;
    pub const COOKIE_PATH: &str = "/";
}

fn build_cookie(name: &str, value: &str, secure: bool, max_age: u32) -> Result<HeaderValue, ApiError> {
    let secure = if secure { " Secure;" } else { "" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path={}; Max-Age={}",
        name,
        value,
        secure,
        config::COOKIE_PATH,
        max_age
    );
    cookie.parse::<HeaderValue>().log_500("Failed to build cookie")
}

/// Build an access token Set-Cookie header value
pub fn build_access_cookie(token: &str, secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie(config::ACCESS_TOKEN_NAME, token, secure, config::MAX_AGE_SECS)
}

/// Build a refresh token Set-Cookie header value
pub fn build_refresh_cookie(token: &str, secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie(config::REFRESH_TOKEN_NAME, token, secure, config::MAX_AGE_SECS)
}

/// Build an expiry Set-Cookie header value from unix milliseconds
pub fn build_expiry_cookie(expires_at_ms: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie(
        config::TOKEN_EXPIRY_NAME,
        &expires_at_ms.to_string(),
        secure,
        config::MAX_AGE_SECS,
    )
}

/// Set-Cookie values mirroring a credential; absent fields are skipped
pub fn credential_cookies(credential: &Credential, secure: bool) -> Result<Vec<HeaderValue>, ApiError> {
    let mut cookies = vec![build_access_cookie(&credential.access_token, secure)?];
    if let Some(refresh_token) = &credential.refresh_token {
        cookies.push(build_refresh_cookie(refresh_token, secure)?);
    }
    if let Some(expires_at) = credential.expires_at {
        cookies.push(build_expiry_cookie(expires_at.timestamp_millis(), secure)?);
    }
    Ok(cookies)
}

/// Set-Cookie values that remove every credential cookie
pub fn clear_cookies() -> Vec<HeaderValue> {
    [
        config::ACCESS_TOKEN_NAME,
        config::REFRESH_TOKEN_NAME,
        config::TOKEN_EXPIRY_NAME,
    ]
    .iter()
    .map(|name| {
        HeaderValue::from_str(&format!(
            "{}=; HttpOnly; SameSite=Lax; Path={}; Max-Age=0",
            name,
            config::COOKIE_PATH
        ))
    })
    .filter_map(Result::ok)
    .collect()
}

/// Credential carried by the request cookies, if an access token is present
pub fn credential_from_jar(jar: &CookieJar) -> Option<Credential> {
    let access_token = jar
        .get(config::ACCESS_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())?;

    let refresh_token = jar
        .get(config::REFRESH_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let expires_at = jar
        .get(config::TOKEN_EXPIRY_NAME)
        .and_then(|c| c.value().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis);

    Some(Credential {
        access_token,
        refresh_token,
        expires_at,
    })
}
