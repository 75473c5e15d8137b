//! Sign-in, session and sign-out endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::auth::account::is_valid_account_id;
use crate::auth::session::{unix_now, Credential};
use crate::auth::signature::{verify_payload, SignaturePayload};
use crate::error::GateError;
use crate::http::cookies::{clear_session_cookie, session_cookie};
use crate::http::middleware::{Authenticated, ClientSource};
use crate::http::request::client_source;
use crate::http::response::insert_rate_limit_headers;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::rate_limit::Decision;

/// Per-route limiter guarding sign-in.
pub const LOGIN_ACTION: &str = "auth.login";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub account_id: String,
    pub message: String,
    pub signature: String,
    pub public_key: String,
    /// Base64 of the 32 raw nonce bytes.
    pub nonce: String,
    pub recipient: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub account_id: String,
    pub user_id: String,
    pub expires_at: u64,
}

impl From<&Credential> for SessionResponse {
    fn from(credential: &Credential) -> Self {
        Self {
            account_id: credential.account_id.clone(),
            user_id: credential.user_id.clone(),
            expires_at: credential.expires_at,
        }
    }
}

/// `POST /api/auth/login`
pub async fn sign_in(
    State(state): State<AppState>,
    admitted: Option<Extension<ClientSource>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let source = admitted.map_or_else(|| client_source(&headers), |Extension(ClientSource(s))| s);

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = body_read_error(&state, &rejection);
            state.pipeline.record_rejection(&err, &source, "/api/auth/login");
            return err.into_response();
        }
    };

    let mut advertised: Option<Decision> = None;
    if let Some((decision, strict)) = state.limits.check_route(LOGIN_ACTION, &source) {
        if !decision.allowed {
            let err = GateError::RateLimited { decision, strict };
            state.pipeline.record_rejection(&err, &source, "/api/auth/login");
            return err.into_response();
        }
        if strict {
            advertised = Some(decision);
        }
    }

    let mut response = match authenticate(&state, &body) {
        Ok(identity) => match issue(&state, jar, &identity) {
            Ok(response) => {
                metrics::record_auth_attempt("success");
                tracing::info!(account_id = %identity.account_id, source = %source, "Sign-in succeeded");
                response
            }
            Err(err) => err.into_response(),
        },
        Err((err, account_id)) => {
            metrics::record_auth_attempt("failure");
            tracing::warn!(account_id = %account_id, source = %source, error = %err, "Sign-in failed");
            state.pipeline.record_rejection(&err, &source, "/api/auth/login");
            err.into_response()
        }
    };

    if let Some(decision) = advertised {
        insert_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

/// Map a failed body read. A streamed body cut off by the body-limit layer
/// counts as oversized.
fn body_read_error(state: &AppState, rejection: &BytesRejection) -> GateError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GateError::PayloadTooLarge {
            limit: state.config.security.max_body_bytes,
            actual: None,
        }
    } else {
        GateError::InvalidInput("Unreadable request body".to_string())
    }
}

struct Identity {
    user_id: String,
    account_id: String,
}

/// Validate the sign-in body and resolve the caller. Errors carry the
/// attempted account ID for logging.
fn authenticate(state: &AppState, body: &[u8]) -> Result<Identity, (GateError, String)> {
    let request: SignInRequest = serde_json::from_slice(body).map_err(|_| {
        (
            GateError::InvalidInput("Malformed sign-in body".to_string()),
            String::new(),
        )
    })?;
    let account_id = request.account_id.clone();
    let fail = |err: GateError| (err, account_id.clone());

    let caps = &state.config.auth;
    if request.message.len() > caps.max_message_bytes
        || request.callback_url.as_ref().map_or(0, String::len) > caps.max_message_bytes
    {
        return Err(fail(GateError::InvalidInput("message too long".to_string())));
    }
    if request.signature.len() > caps.max_signature_len {
        return Err(fail(GateError::InvalidInput("signature too long".to_string())));
    }
    if request.public_key.len() > caps.max_public_key_len {
        return Err(fail(GateError::InvalidInput("publicKey too long".to_string())));
    }
    if !is_valid_account_id(&request.account_id) {
        return Err(fail(GateError::InvalidInput("Invalid accountId".to_string())));
    }
    let nonce = BASE64
        .decode(request.nonce.trim())
        .map_err(|_| fail(GateError::InvalidInput("nonce must be base64".to_string())))?;

    if request.recipient != state.config.site.domain {
        return Err(fail(GateError::AuthenticationFailed(format!(
            "recipient mismatch: {}",
            request.recipient
        ))));
    }

    let Ok(nonce) = <[u8; 32]>::try_from(nonce.as_slice()) else {
        return Err(fail(GateError::AuthenticationFailed(
            "nonce is not 32 bytes".to_string(),
        )));
    };
    let payload = SignaturePayload::new(&request.message, nonce, &request.recipient)
        .with_callback_url(request.callback_url.as_deref());
    if !verify_payload(&request.public_key, &request.signature, &payload) {
        return Err(fail(GateError::AuthenticationFailed(
            "signature verification failed".to_string(),
        )));
    }

    if caps.nonce_replay_protection && !state.nonces.check_and_store(nonce) {
        return Err(fail(GateError::AuthenticationFailed("nonce reused".to_string())));
    }

    let user_id = state.users.resolve(&request.account_id).map_err(fail)?;
    Ok(Identity {
        user_id,
        account_id: request.account_id,
    })
}

fn issue(state: &AppState, jar: CookieJar, identity: &Identity) -> Result<Response, GateError> {
    let credential = state
        .sessions
        .credential_at(&identity.user_id, &identity.account_id, unix_now());
    let token = state.sessions.encode(&credential)?;
    let cookie = session_cookie(
        &state.config.session.cookie_name,
        &token,
        state.sessions.lifetime().as_secs(),
        state.config.site.production,
    );
    Ok((jar.add(cookie), Json(SessionResponse::from(&credential))).into_response())
}

/// `GET /api/auth/session`
pub async fn current_session(Authenticated(credential): Authenticated) -> Json<SessionResponse> {
    Json(SessionResponse::from(&credential))
}

/// `POST /api/auth/logout`
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let cookie = clear_session_cookie(&state.config.session.cookie_name, state.config.site.production);
    (StatusCode::NO_CONTENT, jar.add(cookie))
}
