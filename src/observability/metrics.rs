//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_rejected_total` (counter): rejections by reason
//! - `gate_auth_attempts_total` (counter): sign-in attempts by outcome
//! - `gate_abuse_events_total` (counter): abuse events by kind
//! - `gate_abuse_alerts_total` (counter): alerts raised by the aggregator
//! - `gate_rate_limit_tracked_keys` (gauge): live keys per limiter
//! - `gate_sessions_rotated_total` (counter): transparent session re-issues
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exposition is opt-in via config

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rejection(reason: &'static str) {
    counter!("gate_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_auth_attempt(outcome: &'static str) {
    counter!("gate_auth_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_abuse_event(kind: &'static str) {
    counter!("gate_abuse_events_total", "kind" => kind).increment(1);
}

pub fn record_abuse_alert() {
    counter!("gate_abuse_alerts_total").increment(1);
}

pub fn record_tracked_keys(limiter: &str, keys: usize) {
    gauge!("gate_rate_limit_tracked_keys", "limiter" => limiter.to_string()).set(keys as f64);
}

pub fn record_session_rotated() {
    counter!("gate_sessions_rotated_total").increment(1);
}
