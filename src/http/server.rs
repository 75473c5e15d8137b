//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared state (pipeline, limiters, session codec, registries)
//! - Create the Axum router with the auth, health and cron endpoints
//! - Wire up middleware (request ID, tracing, timeout, admission, sessions)
//! - Spawn the periodic sweepers and serve until shutdown

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{InMemoryUserDirectory, NonceRegistry, SessionCodec, UserDirectory};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::http::middleware::{pipeline_middleware, session_middleware};
use crate::http::request::X_REQUEST_ID;
use crate::http::{auth, maintenance};
use crate::lifecycle::Shutdown;
use crate::security::abuse::AbuseAggregator;
use crate::security::pipeline::Pipeline;
use crate::security::rate_limit::LimiterSet;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub pipeline: Arc<Pipeline>,
    pub sessions: Arc<SessionCodec>,
    pub limits: Arc<LimiterSet>,
    pub abuse: Arc<AbuseAggregator>,
    pub users: Arc<dyn UserDirectory>,
    pub nonces: Arc<NonceRegistry>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        Self::with_users(config, Arc::new(InMemoryUserDirectory::new()))
    }

    pub fn with_users(config: GateConfig, users: Arc<dyn UserDirectory>) -> Result<Self, GateError> {
        let secret = if config.session.secret.is_empty() {
            tracing::warn!("No session secret configured; using an ephemeral one. Sessions will not survive a restart");
            let mut bytes = [0u8; 64];
            OsRng.fill_bytes(&mut bytes);
            bytes.to_vec()
        } else {
            config.session.secret.as_bytes().to_vec()
        };
        let sessions = SessionCodec::new(&secret, Duration::from_secs(config.session.lifetime_secs))?;

        let limits = Arc::new(LimiterSet::from_config(&config.rate_limit));
        let abuse = Arc::new(AbuseAggregator::new(&config.abuse));
        let pipeline = Pipeline::new(&config, limits.clone(), abuse.clone());
        let nonces = NonceRegistry::new(Duration::from_secs(config.auth.nonce_ttl_secs));

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(sessions),
            limits,
            abuse,
            users,
            nonces: Arc::new(nonces),
            started_at: Instant::now(),
        })
    }
}

/// HTTP server for the gate.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        Ok(Self::from_state(AppState::new(config)?))
    }

    pub fn from_state(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID, trace, request ID propagation, timeout,
    /// admission pipeline, body limit, session.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let max_body = usize::try_from(config.security.max_body_bytes).unwrap_or(usize::MAX);

        Router::new()
            .route("/api/auth/login", post(auth::sign_in))
            .route("/api/auth/session", get(auth::current_session))
            .route("/api/auth/logout", post(auth::sign_out))
            .route("/api/health", get(maintenance::health))
            .route("/api/cron/maintenance", post(maintenance::run_maintenance))
            .fallback(not_found)
            .layer(from_fn_with_state(state.clone(), session_middleware))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_body))
            .layer(from_fn_with_state(state.clone(), pipeline_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(&X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
            .with_state(state)
    }

    /// Run the server until `shutdown` fires. Sweepers run for the same
    /// lifetime.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let every = Duration::from_secs(self.state.config.rate_limit.sweep_interval_secs.max(1));
        let mut sweepers: Vec<_> = self
            .state
            .limits
            .all()
            .map(|limiter| limiter.spawn_sweeper(every, shutdown.subscribe()))
            .collect();
        sweepers.push(self.state.nonces.spawn_sweeper(every, shutdown.subscribe()));

        let mut signal = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = signal.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        for sweeper in sweepers {
            let _ = sweeper.await;
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
