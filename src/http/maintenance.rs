//! Liveness probe and the cron-triggered maintenance job.

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::http::middleware::ClientSource;
use crate::http::request::client_source;
use crate::http::server::AppState;
use crate::security::bearer::bearer_matches;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub rate_limit_keys_removed: usize,
    pub nonces_purged: usize,
    pub abuse_events_purged: usize,
}

/// `POST /api/cron/maintenance`, authenticated by `cron.secret`.
pub async fn run_maintenance(
    State(state): State<AppState>,
    admitted: Option<Extension<ClientSource>>,
    headers: HeaderMap,
) -> Response {
    let authorized = state
        .config
        .cron
        .secret
        .as_deref()
        .is_some_and(|secret| bearer_matches(&headers, secret));

    if !authorized {
        let err = GateError::AuthenticationFailed("cron bearer secret mismatch".to_string());
        let source = admitted.map_or_else(|| client_source(&headers), |Extension(ClientSource(s))| s);
        state
            .pipeline
            .record_rejection(&err, &source, "/api/cron/maintenance");
        return err.into_response();
    }

    let report = MaintenanceReport {
        rate_limit_keys_removed: state.limits.sweep_all(),
        nonces_purged: state.nonces.purge_expired(),
        abuse_events_purged: state.abuse.purge_expired(),
    };
    tracing::info!(
        rate_limit_keys_removed = report.rate_limit_keys_removed,
        nonces_purged = report.nonces_purged,
        abuse_events_purged = report.abuse_events_purged,
        "Maintenance run complete"
    );
    Json(report).into_response()
}
