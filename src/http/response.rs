//! Response header helpers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::security::rate_limit::Decision;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Write `X-RateLimit-Limit`, `-Remaining` and `-Reset` (seconds until the
/// window frees capacity).
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        X_RATELIMIT_RESET.clone(),
        HeaderValue::from(decision.reset_after_secs()),
    );
}
