//! Admission middleware.
//!
//! Runs the security pipeline before routing, then decorates the response
//! with the CSRF cookie, strict rate limit headers and security headers.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::cookies::{append_cookie, csrf_cookie};
use crate::http::request::InboundRequest;
use crate::http::response::{insert_rate_limit_headers, X_RATELIMIT_LIMIT};
use crate::http::server::AppState;
use crate::security::headers::apply_security_headers;
use crate::security::pipeline::Verdict;

/// Caller identity as resolved by the pipeline.
#[derive(Debug, Clone)]
pub struct ClientSource(pub String);

pub async fn pipeline_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let inbound = InboundRequest::from_parts(&parts);

    let admission = match state.pipeline.inspect(&inbound) {
        Verdict::Forward(admission) => admission,
        Verdict::Reject(err) => {
            let mut response = err.into_response();
            decorate(&state, response.headers_mut());
            return response;
        }
    };

    let mut request = Request::from_parts(parts, body);
    request
        .extensions_mut()
        .insert(ClientSource(admission.source.clone()));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    if let Some(token) = admission.csrf_token {
        let cookie = csrf_cookie(
            state.pipeline.csrf().cookie_name(),
            &token,
            state.config.site.production,
        );
        append_cookie(headers, &cookie);
    }

    // A per-route limiter's headers take precedence over the global ones
    if let Some(decision) = admission.rate_headers {
        if !headers.contains_key(&X_RATELIMIT_LIMIT) {
            insert_rate_limit_headers(headers, &decision);
        }
    }

    decorate(&state, headers);
    response
}

fn decorate(state: &AppState, headers: &mut HeaderMap) {
    if state.config.security.enable_headers {
        apply_security_headers(headers, state.config.site.production);
    }
}
