//! Request-level error taxonomy.
//!
//! Every rejection the gate produces is a `GateError`. Each variant maps to
//! one HTTP status, one metric reason, and (for security rejections) one
//! abuse event kind. Client-facing messages stay generic; the detail goes to
//! the log.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::http::response::insert_rate_limit_headers;
use crate::security::abuse::AbuseKind;
use crate::security::csrf::CsrfFailure;
use crate::security::rate_limit::Decision;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `actual` is unknown when the body was streamed without a declared length.
    #[error("payload too large: exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: u64, actual: Option<u64> },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("session missing or invalid")]
    SessionInvalid,

    #[error("origin not allowed: {origin}")]
    OriginMismatch { origin: String },

    #[error("csrf check failed: {0}")]
    CsrfRejected(CsrfFailure),

    #[error("client blocked by user-agent policy")]
    BlockedClient,

    #[error("rate limit exceeded")]
    RateLimited { decision: Decision, strict: bool },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GateError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GateError::AuthenticationFailed(_) | GateError::SessionInvalid => {
                StatusCode::UNAUTHORIZED
            }
            GateError::OriginMismatch { .. }
            | GateError::CsrfRejected(_)
            | GateError::BlockedClient => StatusCode::FORBIDDEN,
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Abuse event recorded for this rejection, if any.
    pub fn abuse_kind(&self) -> Option<AbuseKind> {
        match self {
            GateError::OriginMismatch { .. } | GateError::CsrfRejected(_) => {
                Some(AbuseKind::CsrfFailure)
            }
            GateError::BlockedClient => Some(AbuseKind::SuspiciousUa),
            GateError::AuthenticationFailed(_) | GateError::SessionInvalid => {
                Some(AbuseKind::AuthFailure)
            }
            GateError::PayloadTooLarge { .. } => Some(AbuseKind::OversizedRequest),
            GateError::RateLimited { .. } => Some(AbuseKind::RateLimit),
            GateError::InvalidInput(_) | GateError::Internal(_) => None,
        }
    }

    /// Short label used as the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::InvalidInput(_) => "invalid_input",
            GateError::PayloadTooLarge { .. } => "payload_too_large",
            GateError::AuthenticationFailed(_) => "auth_failed",
            GateError::SessionInvalid => "session_invalid",
            GateError::OriginMismatch { .. } => "origin_mismatch",
            GateError::CsrfRejected(_) => "csrf",
            GateError::BlockedClient => "blocked_client",
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Internal(_) => "internal",
        }
    }

    fn client_message(&self) -> String {
        match self {
            GateError::InvalidInput(msg) => msg.clone(),
            GateError::PayloadTooLarge { .. } => "Payload too large".to_string(),
            GateError::AuthenticationFailed(_) => "Authentication failed".to_string(),
            GateError::SessionInvalid => "Unauthorized".to_string(),
            GateError::OriginMismatch { .. }
            | GateError::CsrfRejected(_)
            | GateError::BlockedClient => "Forbidden".to_string(),
            GateError::RateLimited { .. } => "Too many requests".to_string(),
            GateError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        if let GateError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal error");
        }

        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.client_message() }))).into_response();

        if let GateError::RateLimited { decision, strict } = &self {
            let headers = response.headers_mut();
            if let Some(secs) = decision.retry_after_secs() {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            if *strict {
                insert_rate_limit_headers(headers, decision);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rejected() -> Decision {
        Decision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_after: Duration::from_millis(12_300),
            retry_after: Some(Duration::from_millis(12_300)),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GateError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GateError::PayloadTooLarge { limit: 1, actual: Some(2) }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(GateError::SessionInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GateError::CsrfRejected(CsrfFailure::Mismatch).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(GateError::BlockedClient.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_abuse_kind_mapping() {
        assert_eq!(
            GateError::OriginMismatch { origin: "https://evil.io".into() }.abuse_kind(),
            Some(AbuseKind::CsrfFailure)
        );
        assert_eq!(GateError::BlockedClient.abuse_kind(), Some(AbuseKind::SuspiciousUa));
        assert_eq!(
            GateError::AuthenticationFailed("bad sig".into()).abuse_kind(),
            Some(AbuseKind::AuthFailure)
        );
        assert_eq!(GateError::InvalidInput("x".into()).abuse_kind(), None);
        assert_eq!(GateError::Internal("x".into()).abuse_kind(), None);
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let response = GateError::RateLimited { decision: rejected(), strict: true }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "13");
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "10");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
    }

    #[test]
    fn test_lenient_rate_limit_omits_counters() {
        let response = GateError::RateLimited { decision: rejected(), strict: false }.into_response();
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        assert_eq!(
            GateError::Internal("db password wrong".into()).client_message(),
            "Internal server error"
        );
        assert_eq!(GateError::InvalidInput("accountId is malformed".into()).client_message(), "accountId is malformed");
    }
}
