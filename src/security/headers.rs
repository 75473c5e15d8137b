//! Security response headers.
//!
//! Added to every response unless a handler already set the header.

use axum::http::header::{
    REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

static PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

pub fn apply_security_headers(headers: &mut HeaderMap, production: bool) {
    headers
        .entry(X_CONTENT_TYPE_OPTIONS)
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry(X_FRAME_OPTIONS)
        .or_insert(HeaderValue::from_static("DENY"));
    headers
        .entry(REFERRER_POLICY)
        .or_insert(HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers
        .entry(PERMISSIONS_POLICY.clone())
        .or_insert(HeaderValue::from_static("camera=(), microphone=(), geolocation=()"));

    if production {
        headers
            .entry(STRICT_TRANSPORT_SECURITY)
            .or_insert(HeaderValue::from_static("max-age=63072000; includeSubDomains"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_added() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, false);
        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert!(headers.get(STRICT_TRANSPORT_SECURITY).is_none());

        apply_security_headers(&mut headers, true);
        assert!(headers.get(STRICT_TRANSPORT_SECURITY).is_some());
    }

    #[test]
    fn test_existing_header_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        apply_security_headers(&mut headers, false);
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
    }
}
