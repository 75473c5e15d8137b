use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::security::abuse::AbuseSummary;
use crate::security::rate_limit::LimiterStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub buffered_abuse_events: usize,
    pub tracked_nonces: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        buffered_abuse_events: state.abuse.len(),
        tracked_nonces: state.nonces.len(),
    })
}

/// Events currently inside the abuse window.
pub async fn get_abuse(State(state): State<AppState>) -> Json<AbuseSummary> {
    Json(state.abuse.summarize())
}

/// Tracked keys per limiter.
pub async fn get_limits(State(state): State<AppState>) -> Json<Vec<LimiterStats>> {
    Json(state.limits.stats())
}
