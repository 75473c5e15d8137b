//! Abuse event aggregation.
//!
//! Security rejections are recorded here as events in a bounded, time-ordered
//! buffer. When the number of events inside the trailing window reaches the
//! threshold, one alert is emitted, then suppressed for the cooldown period.
//! State is in-memory and lost on restart.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::AbuseConfig;
use crate::observability::metrics;

/// Category of a recorded rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbuseKind {
    AuthFailure,
    RateLimit,
    CsrfFailure,
    OversizedRequest,
    SuspiciousUa,
}

impl AbuseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbuseKind::AuthFailure => "auth_failure",
            AbuseKind::RateLimit => "rate_limit",
            AbuseKind::CsrfFailure => "csrf_failure",
            AbuseKind::OversizedRequest => "oversized_request",
            AbuseKind::SuspiciousUa => "suspicious_ua",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AbuseEvent {
    pub kind: AbuseKind,
    pub source: String,
    pub path: String,
    pub at: Instant,
}

impl AbuseEvent {
    pub fn new(kind: AbuseKind, source: impl Into<String>, path: impl Into<String>) -> Self {
        Self::at(kind, source, path, Instant::now())
    }

    pub fn at(
        kind: AbuseKind,
        source: impl Into<String>,
        path: impl Into<String>,
        at: Instant,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            path: path.into(),
            at,
        }
    }
}

/// Most frequent source in the window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopSource {
    pub source: String,
    pub count: usize,
}

/// Snapshot of the events currently inside the window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct AbuseSummary {
    pub total: usize,
    pub by_kind: BTreeMap<AbuseKind, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub top_source: Option<TopSource>,
}

/// Receives threshold alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, summary: &AbuseSummary, window: Duration);
}

/// Writes alerts to the log at error level.
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, summary: &AbuseSummary, window: Duration) {
        let top = summary
            .top_source
            .as_ref()
            .map(|t| format!("{} ({})", t.source, t.count))
            .unwrap_or_else(|| "-".to_string());
        tracing::error!(
            total = summary.total,
            window_secs = window.as_secs(),
            top_source = %top,
            by_kind = ?summary.by_kind,
            "Abuse threshold exceeded"
        );
    }
}

struct State {
    events: VecDeque<AbuseEvent>,
    last_alert: Option<Instant>,
}

/// Bounded sliding-window event aggregator.
pub struct AbuseAggregator {
    window: Duration,
    threshold: usize,
    cooldown: Duration,
    max_events: usize,
    state: Mutex<State>,
    sink: Arc<dyn AlertSink>,
}

impl AbuseAggregator {
    pub fn new(config: &AbuseConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingAlertSink))
    }

    pub fn with_sink(config: &AbuseConfig, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            threshold: config.threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
            max_events: config.max_events.max(1),
            state: Mutex::new(State {
                events: VecDeque::new(),
                last_alert: None,
            }),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trim(&self, events: &mut VecDeque<AbuseEvent>, now: Instant) {
        while let Some(front) = events.front() {
            if now.saturating_duration_since(front.at) > self.window {
                events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record one event. Returns `true` if this event triggered an alert.
    pub fn record(&self, event: AbuseEvent) -> bool {
        let now = event.at;
        metrics::record_abuse_event(event.kind.as_str());
        tracing::debug!(kind = event.kind.as_str(), source = %event.source, path = %event.path, "Abuse event recorded");

        let summary = {
            let mut state = self.lock();
            state.events.push_back(event);
            self.trim(&mut state.events, now);
            while state.events.len() > self.max_events {
                state.events.pop_front();
            }

            let cooled_down = state
                .last_alert
                .map_or(true, |last| now.saturating_duration_since(last) >= self.cooldown);
            if state.events.len() < self.threshold || !cooled_down {
                return false;
            }
            state.last_alert = Some(now);
            summarize(&state.events)
        };

        metrics::record_abuse_alert();
        self.sink.alert(&summary, self.window);
        true
    }

    /// Summary of the events currently inside the window.
    pub fn summarize(&self) -> AbuseSummary {
        self.summarize_at(Instant::now())
    }

    pub fn summarize_at(&self, now: Instant) -> AbuseSummary {
        let mut state = self.lock();
        self.trim(&mut state.events, now);
        summarize(&state.events)
    }

    /// Drop events older than the window. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut state = self.lock();
        let before = state.events.len();
        self.trim(&mut state.events, now);
        before - state.events.len()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn summarize(events: &VecDeque<AbuseEvent>) -> AbuseSummary {
    let mut by_kind = BTreeMap::new();
    let mut by_source: HashMap<&str, usize> = HashMap::new();
    for event in events {
        *by_kind.entry(event.kind).or_insert(0) += 1;
        *by_source.entry(event.source.as_str()).or_insert(0) += 1;
    }

    // Highest count wins; ties go to the lexicographically smallest source
    let top_source = by_source
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(source, count)| TopSource {
            source: source.to_string(),
            count: *count,
        });

    AbuseSummary {
        total: events.len(),
        by_kind,
        by_source: by_source
            .into_iter()
            .map(|(source, count)| (source.to_string(), count))
            .collect(),
        top_source,
    }
}
