//! Keyed, time-windowed admission counters.
//!
//! One `RateLimiter` is built per protected surface (global per-IP, one per
//! route action). Instances never share counters.
//!
//! # Strategies
//! - `SlidingLog`: per-key timestamp log, exact trailing-window semantics,
//!   O(hits in window) per call.
//! - `FixedBucket`: per-key counter with a reset time. Cheaper, admits up to
//!   `2 × limit` across a window boundary.
//!
//! # Memory bound
//! The key map never exceeds `max_keys`. Admitting a new key at capacity
//! first evicts the entry with the oldest creation time. Expired entries are
//! removed by a periodic sweep; on access an expired entry is reset in place.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{RateLimitConfig, RateLimitRule};
use crate::observability::metrics;

/// Counting strategy, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SlidingLog,
    #[default]
    FixedBucket,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Configured limit.
    pub limit: u32,
    /// Admissions left in the current window. Always 0 when rejected.
    pub remaining: u32,
    /// Time until the window frees capacity again.
    pub reset_after: Duration,
    /// Set on rejection only.
    pub retry_after: Option<Duration>,
}

impl Decision {
    fn allowed(limit: u32, remaining: u32, reset_after: Duration) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_after,
            retry_after: None,
        }
    }

    fn rejected(limit: u32, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_after: retry_after,
            retry_after: Some(retry_after),
        }
    }

    /// `Retry-After` value in whole seconds, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(ceil_secs)
    }

    /// Seconds until the window resets, rounded up.
    pub fn reset_after_secs(&self) -> u64 {
        ceil_secs(self.reset_after)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = if d.subsec_nanos() > 0 {
        d.as_secs() + 1
    } else {
        d.as_secs()
    };
    secs.max(1)
}

enum Entry {
    Log {
        hits: VecDeque<Instant>,
        created_at: Instant,
    },
    Bucket {
        count: u32,
        reset_at: Instant,
        created_at: Instant,
    },
}

impl Entry {
    fn fresh(strategy: Strategy, now: Instant, window: Duration) -> Self {
        match strategy {
            Strategy::SlidingLog => Entry::Log {
                hits: VecDeque::new(),
                created_at: now,
            },
            Strategy::FixedBucket => Entry::Bucket {
                count: 0,
                reset_at: now + window,
                created_at: now,
            },
        }
    }

    fn created_at(&self) -> Instant {
        match self {
            Entry::Log { created_at, .. } | Entry::Bucket { created_at, .. } => *created_at,
        }
    }

    /// True once the window has fully elapsed since the last admitted hit.
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        match self {
            Entry::Log { hits, .. } => hits
                .back()
                .map_or(true, |last| now.saturating_duration_since(*last) >= window),
            Entry::Bucket { reset_at, .. } => now >= *reset_at,
        }
    }

    fn admit(&mut self, now: Instant, limit: u32, window: Duration) -> Decision {
        match self {
            Entry::Log { hits, created_at } => {
                while let Some(&oldest) = hits.front() {
                    if now.saturating_duration_since(oldest) >= window {
                        hits.pop_front();
                    } else {
                        break;
                    }
                }
                if hits.is_empty() {
                    *created_at = now;
                }

                let used = hits.len() as u32;
                if used >= limit {
                    let oldest = hits.front().copied().unwrap_or(now);
                    let retry = window.saturating_sub(now.saturating_duration_since(oldest));
                    return Decision::rejected(limit, retry);
                }

                hits.push_back(now);
                let oldest = hits.front().copied().unwrap_or(now);
                let reset = window.saturating_sub(now.saturating_duration_since(oldest));
                Decision::allowed(limit, limit - used - 1, reset)
            }
            Entry::Bucket {
                count,
                reset_at,
                created_at,
            } => {
                if now >= *reset_at {
                    *count = 0;
                    *reset_at = now + window;
                    *created_at = now;
                }

                let reset = reset_at.saturating_duration_since(now);
                if *count >= limit {
                    return Decision::rejected(limit, reset);
                }
                *count += 1;
                Decision::allowed(limit, limit - *count, reset)
            }
        }
    }
}

/// A keyed admission counter for one surface.
pub struct RateLimiter {
    name: String,
    limit: u32,
    window: Duration,
    max_keys: usize,
    strategy: Strategy,
    strict_headers: bool,
    entries: Mutex<HashMap<String, Entry>>,
    sweeping: AtomicBool,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` calls per `window` for each key,
    /// tracking at most `max_keys` keys. `limit` and `max_keys` are clamped
    /// to at least 1.
    pub fn new(
        name: impl Into<String>,
        limit: u32,
        window: Duration,
        max_keys: usize,
        strategy: Strategy,
    ) -> Self {
        Self {
            name: name.into(),
            limit: limit.max(1),
            window,
            max_keys: max_keys.max(1),
            strategy,
            strict_headers: false,
            entries: Mutex::new(HashMap::new()),
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn from_rule(name: impl Into<String>, rule: &RateLimitRule) -> Self {
        Self::new(
            name,
            rule.limit,
            Duration::from_millis(rule.window_ms),
            rule.max_keys,
            rule.strategy,
        )
        .with_strict_headers(rule.strict_headers)
    }

    /// Emit `X-RateLimit-*` headers for this surface.
    #[must_use]
    pub fn with_strict_headers(mut self, strict: bool) -> Self {
        self.strict_headers = strict;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn strict_headers(&self) -> bool {
        self.strict_headers
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check and record one call for `key`.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Check and record one call for `key` at the given instant.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut entries = self.lock();

        if !entries.contains_key(key) && entries.len() >= self.max_keys {
            if let Some(evicted) = evict_oldest(&mut entries) {
                tracing::debug!(limiter = %self.name, key = %evicted, "Evicted oldest rate limit entry");
            }
        }

        let entry = entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::fresh(self.strategy, now, self.window));
        entry.admit(now, self.limit, self.window)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Remove every entry whose window has fully elapsed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Sweep at the given instant. Returns the number of removed keys, or 0
    /// if another sweep is already running.
    pub fn sweep_at(&self, now: Instant) -> usize {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let (removed, remaining) = {
            let mut entries = self.lock();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now, self.window));
            (before - entries.len(), entries.len())
        };
        self.sweeping.store(false, Ordering::Release);

        metrics::record_tracked_keys(&self.name, remaining);
        if removed > 0 {
            tracing::debug!(limiter = %self.name, removed, remaining, "Swept expired rate limit entries");
        }
        removed
    }

    /// Drop all state. The limiter stays usable and starts empty.
    pub fn dispose(&self) {
        self.lock().clear();
        metrics::record_tracked_keys(&self.name, 0);
    }

    /// Run `sweep` every `every` until shutdown is signalled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.sweep();
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(limiter = %limiter.name, "Sweeper received shutdown signal");
                        break;
                    }
                }
            }
        })
    }
}

fn evict_oldest(entries: &mut HashMap<String, Entry>) -> Option<String> {
    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.created_at())
        .map(|(key, _)| key.clone())?;
    entries.remove(&oldest);
    Some(oldest)
}

/// Tracked-key count for one limiter, as reported by the admin API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LimiterStats {
    pub name: String,
    pub strategy: Strategy,
    pub tracked_keys: usize,
}

/// The process-wide set of limiters: an optional global one and one per
/// configured route action.
pub struct LimiterSet {
    global: Option<Arc<RateLimiter>>,
    routes: HashMap<String, Arc<RateLimiter>>,
}

impl LimiterSet {
    /// Name of the global limiter.
    pub const GLOBAL: &'static str = "global";

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let global = config
            .global
            .enabled
            .then(|| Arc::new(RateLimiter::from_rule(Self::GLOBAL, &config.global)));
        let routes = config
            .routes
            .iter()
            .filter(|route| route.rule.enabled)
            .map(|route| {
                (
                    route.action.clone(),
                    Arc::new(RateLimiter::from_rule(route.action.clone(), &route.rule)),
                )
            })
            .collect();
        Self { global, routes }
    }

    pub fn global(&self) -> Option<&Arc<RateLimiter>> {
        self.global.as_ref()
    }

    pub fn route(&self, action: &str) -> Option<&Arc<RateLimiter>> {
        self.routes.get(action)
    }

    /// Check the limiter for `action`, keyed by source and action. `None`
    /// when no limiter is configured for the action.
    pub fn check_route(&self, action: &str, source: &str) -> Option<(Decision, bool)> {
        let limiter = self.routes.get(action)?;
        let decision = limiter.check(&format!("{source}:{action}"));
        Some((decision, limiter.strict_headers()))
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<RateLimiter>> {
        self.global.iter().chain(self.routes.values())
    }

    /// Sweep every limiter; returns the total number of removed keys.
    pub fn sweep_all(&self) -> usize {
        self.all().map(|limiter| limiter.sweep()).sum()
    }

    pub fn stats(&self) -> Vec<LimiterStats> {
        let mut stats: Vec<_> = self
            .all()
            .map(|limiter| LimiterStats {
                name: limiter.name().to_string(),
                strategy: limiter.strategy(),
                tracked_keys: limiter.tracked_keys(),
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use proptest::prelude::*;

    const STRATEGIES: [Strategy; 2] = [Strategy::SlidingLog, Strategy::FixedBucket];

    fn limiter(strategy: Strategy, limit: u32, max_keys: usize) -> RateLimiter {
        RateLimiter::new("test", limit, Duration::from_secs(60), max_keys, strategy)
    }

    #[test]
    fn test_first_n_allowed_with_decreasing_remaining() {
        for strategy in STRATEGIES {
            let limiter = limiter(strategy, 5, 100);
            let t0 = Instant::now();

            let mut last_remaining = u32::MAX;
            for i in 0..5 {
                let d = limiter.check_at("1.2.3.4", t0 + Duration::from_millis(i));
                assert!(d.allowed, "{strategy:?} call {i} should be allowed");
                assert!(d.remaining < last_remaining, "{strategy:?} remaining must decrease");
                last_remaining = d.remaining;
            }
            assert_eq!(last_remaining, 0);

            let d = limiter.check_at("1.2.3.4", t0 + Duration::from_millis(10));
            assert!(!d.allowed, "{strategy:?} call N+1 should be rejected");
            assert_eq!(d.remaining, 0);
            assert!(d.retry_after_secs().unwrap() >= 1);
        }
    }

    #[test]
    fn test_window_elapse_restores_admission() {
        for strategy in STRATEGIES {
            let limiter = limiter(strategy, 2, 100);
            let t0 = Instant::now();

            assert!(limiter.check_at("k", t0).allowed);
            assert!(limiter.check_at("k", t0).allowed);
            assert!(!limiter.check_at("k", t0 + Duration::from_secs(30)).allowed);

            let later = t0 + Duration::from_secs(61);
            let d = limiter.check_at("k", later);
            assert!(d.allowed, "{strategy:?} should admit after the window");
            assert_eq!(d.remaining, 1);
        }
    }

    #[test]
    fn test_keys_are_independent() {
        for strategy in STRATEGIES {
            let limiter = limiter(strategy, 1, 100);
            let t0 = Instant::now();
            assert!(limiter.check_at("a", t0).allowed);
            assert!(!limiter.check_at("a", t0).allowed);
            assert!(limiter.check_at("b", t0).allowed);
        }
    }

    #[test]
    fn test_sliding_log_retry_after_tracks_oldest_hit() {
        let limiter = limiter(Strategy::SlidingLog, 2, 100);
        let t0 = Instant::now();
        limiter.check_at("k", t0);
        limiter.check_at("k", t0 + Duration::from_secs(20));

        let d = limiter.check_at("k", t0 + Duration::from_secs(45));
        assert!(!d.allowed);
        assert_eq!(d.retry_after, Some(Duration::from_secs(15)));
        assert_eq!(d.retry_after_secs(), Some(15));

        // Oldest hit leaves the window at t0+60; one slot frees up
        assert!(limiter.check_at("k", t0 + Duration::from_secs(60)).allowed);
        assert!(!limiter.check_at("k", t0 + Duration::from_secs(61)).allowed);
    }

    #[test]
    fn test_fixed_bucket_retry_after_tracks_reset() {
        let limiter = limiter(Strategy::FixedBucket, 1, 100);
        let t0 = Instant::now();
        limiter.check_at("k", t0);

        let d = limiter.check_at("k", t0 + Duration::from_millis(59_500));
        assert!(!d.allowed);
        assert_eq!(d.retry_after, Some(Duration::from_millis(500)));
        assert_eq!(d.retry_after_secs(), Some(1));
    }

    #[test]
    fn test_fixed_bucket_admits_burst_across_boundary() {
        let limiter = limiter(Strategy::FixedBucket, 3, 100);
        let t0 = Instant::now();
        let edge = t0 + Duration::from_millis(59_900);
        let after = t0 + Duration::from_millis(60_100);

        assert!(limiter.check_at("k", t0).allowed);
        for _ in 0..2 {
            assert!(limiter.check_at("k", edge).allowed);
        }
        for _ in 0..3 {
            assert!(limiter.check_at("k", after).allowed);
        }
        assert!(!limiter.check_at("k", after).allowed);
    }

    #[test]
    fn test_eviction_removes_oldest_created() {
        for strategy in STRATEGIES {
            let limiter = limiter(strategy, 10, 3);
            let t0 = Instant::now();
            limiter.check_at("first", t0);
            limiter.check_at("second", t0 + Duration::from_millis(1));
            limiter.check_at("third", t0 + Duration::from_millis(2));
            // Repeated traffic on "first" does not refresh its creation time
            limiter.check_at("first", t0 + Duration::from_millis(3));

            limiter.check_at("fourth", t0 + Duration::from_millis(4));
            assert_eq!(limiter.tracked_keys(), 3);

            let entries = limiter.lock();
            assert!(!entries.contains_key("first"), "{strategy:?}");
            assert!(entries.contains_key("fourth"));
        }
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        for strategy in STRATEGIES {
            let limiter = limiter(strategy, 10, 100);
            let t0 = Instant::now();
            limiter.check_at("old", t0);
            limiter.check_at("new", t0 + Duration::from_secs(50));

            let removed = limiter.sweep_at(t0 + Duration::from_secs(70));
            assert_eq!(removed, 1, "{strategy:?}");
            assert_eq!(limiter.tracked_keys(), 1);
        }
    }

    #[test]
    fn test_sweep_skips_when_already_running() {
        let limiter = limiter(Strategy::FixedBucket, 10, 100);
        let t0 = Instant::now();
        limiter.check_at("k", t0);

        limiter.sweeping.store(true, Ordering::Release);
        assert_eq!(limiter.sweep_at(t0 + Duration::from_secs(120)), 0);
        assert_eq!(limiter.tracked_keys(), 1);

        limiter.sweeping.store(false, Ordering::Release);
        assert_eq!(limiter.sweep_at(t0 + Duration::from_secs(120)), 1);
    }

    #[test]
    fn test_dispose_clears_state() {
        let limiter = limiter(Strategy::SlidingLog, 1, 100);
        let t0 = Instant::now();
        limiter.check_at("k", t0);
        assert!(!limiter.check_at("k", t0).allowed);

        limiter.dispose();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.check_at("k", t0).allowed);
    }

    #[test]
    fn test_limiter_set_from_config() {
        let config = RateLimitConfig::default();
        let set = LimiterSet::from_config(&config);

        assert!(set.global().is_some());
        let (decision, strict) = set.check_route("auth.login", "1.2.3.4").unwrap();
        assert!(decision.allowed);
        assert!(strict);
        assert_eq!(decision.remaining, 9);
        assert!(set.check_route("unknown.action", "1.2.3.4").is_none());

        let names: Vec<_> = set.stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["auth.login".to_string(), "global".to_string()]);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let limiter = Arc::new(limiter(Strategy::FixedBucket, 1, 10));
        let (tx, _) = broadcast::channel(1);
        let handle = limiter.spawn_sweeper(Duration::from_millis(10), tx.subscribe());

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit")
            .unwrap();
    }

    proptest! {
        #[test]
        fn prop_tracked_keys_never_exceed_ceiling(
            max_keys in 1usize..32,
            keys in proptest::collection::vec(0u16..200, 1..300),
            sliding in any::<bool>(),
        ) {
            let strategy = if sliding { Strategy::SlidingLog } else { Strategy::FixedBucket };
            let limiter = limiter(strategy, 3, max_keys);
            let t0 = Instant::now();
            for (i, key) in keys.iter().enumerate() {
                limiter.check_at(&key.to_string(), t0 + Duration::from_millis(i as u64));
                prop_assert!(limiter.tracked_keys() <= max_keys);
            }
        }
    }
}
