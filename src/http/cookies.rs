//! Session and CSRF cookie builders.

use axum::http::{HeaderMap, HeaderValue};
use axum::http::header::SET_COOKIE;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Session cookie carrying a signed credential.
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)))
        .build()
}

/// Removal cookie for the session.
pub fn clear_session_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// CSRF token cookie. Readable by client script so it can be echoed.
pub fn csrf_cookie(name: &str, token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

/// Append a `Set-Cookie` header.
pub fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        headers.append(SET_COOKIE, value);
    }
}

/// True if the response already sets cookie `name`.
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{name}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
