//! Inbound request model.
//!
//! Security checks read an `InboundRequest` instead of the raw axum request:
//! method, path, lowercased headers, cookies and declared body length. Each
//! check declares exactly the fields it needs, and tests can build requests
//! without a running server.

use std::collections::HashMap;

use axum::http::header::{CONTENT_LENGTH, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};
use axum_extra::extract::cookie::CookieJar;

/// Request ID header set on every request and echoed on responses.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Source identifier used when no forwarding header is present.
pub const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercase. Repeated headers are joined with ", ".
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Declared `Content-Length`, if any.
    pub body_length: Option<u64>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body_length(mut self, length: u64) -> Self {
        self.body_length = Some(length);
        self
    }

    /// Snapshot the parts of an axum request.
    pub fn from_parts(parts: &Parts) -> Self {
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in parts.headers.iter() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let cookies = CookieJar::from_headers(&parts.headers)
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        let body_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            headers,
            cookies,
            body_length,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT.as_str())
    }

    /// GET, HEAD and OPTIONS.
    pub fn is_safe_method(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD" | "OPTIONS")
    }

    /// Caller identity for rate limiting and abuse tracking.
    pub fn source_identifier(&self) -> String {
        pick_source(self.header(X_FORWARDED_FOR), self.header(X_REAL_IP))
    }
}

/// Caller identity from raw headers; same rules as
/// [`InboundRequest::source_identifier`].
pub fn client_source(headers: &HeaderMap) -> String {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    pick_source(get(X_FORWARDED_FOR), get(X_REAL_IP))
}

fn pick_source(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}
