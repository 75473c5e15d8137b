//! Session cookie verification and rotation.
//!
//! A valid credential is attached to the request as [`SessionContext`]. Past
//! half its lifetime it is re-issued on the response. An invalid cookie is
//! cleared and the request continues anonymously.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::session::Credential;
use crate::error::GateError;
use crate::http::cookies::{append_cookie, clear_session_cookie, session_cookie, sets_cookie};
use crate::http::server::AppState;
use crate::observability::metrics;

/// The verified session of the current request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub credential: Credential,
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookie_name = state.config.session.cookie_name.as_str();
    let secure = state.config.site.production;

    let token = CookieJar::from_headers(request.headers())
        .get(cookie_name)
        .map(|c| c.value().to_string());
    let Some(token) = token else {
        return next.run(request).await;
    };

    let Some(credential) = state.sessions.verify(&token) else {
        tracing::debug!("Clearing invalid session cookie");
        let mut response = next.run(request).await;
        if !sets_cookie(response.headers(), cookie_name) {
            append_cookie(response.headers_mut(), &clear_session_cookie(cookie_name, secure));
        }
        return response;
    };

    let rotate = state.sessions.should_rotate(&credential);
    request.extensions_mut().insert(SessionContext {
        credential: credential.clone(),
    });

    let mut response = next.run(request).await;

    // Handlers that set the cookie themselves (sign-in, sign-out) win
    if rotate && !sets_cookie(response.headers(), cookie_name) {
        match state.sessions.issue(&credential.user_id, &credential.account_id) {
            Ok(token) => {
                let max_age = state.sessions.lifetime().as_secs();
                append_cookie(
                    response.headers_mut(),
                    &session_cookie(cookie_name, &token, max_age, secure),
                );
                metrics::record_session_rotated();
                tracing::debug!(account_id = %credential.account_id, "Rotated session");
            }
            Err(e) => tracing::warn!(error = %e, "Session rotation failed"),
        }
    }

    response
}

/// Extractor for handlers that require a signed-in caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Credential);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .map(|ctx| Authenticated(ctx.credential.clone()))
            .ok_or(GateError::SessionInvalid)
    }
}
