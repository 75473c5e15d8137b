//! Request admission pipeline.
//!
//! Every inbound request is inspected here before it reaches a handler.
//!
//! ```text
//! body size (all paths)
//!   → origin          (API surface)
//!   → user agent      (API surface)
//!   → global limit    (API surface)
//!   → CSRF            (unsafe methods, minus bearer paths)
//!   → Forward, with a CSRF token to set on safe requests
//! ```
//!
//! The first failing check short-circuits. Each rejection is logged, counted
//! and recorded with the abuse aggregator before it is returned.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::security::abuse::{AbuseAggregator, AbuseEvent};
use crate::security::client_filter::ClientFilter;
use crate::security::csrf::{CsrfGuard, CsrfOutcome};
use crate::security::limits::check_body_size;
use crate::security::origin::OriginPolicy;
use crate::security::rate_limit::{Decision, LimiterSet};

/// What the HTTP layer must do for an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub source: String,
    /// Fresh CSRF token to set as a cookie on the response.
    pub csrf_token: Option<String>,
    /// Global limit decision to advertise in `X-RateLimit-*` headers.
    pub rate_headers: Option<Decision>,
}

#[derive(Debug)]
pub enum Verdict {
    Forward(Admission),
    Reject(GateError),
}

pub struct Pipeline {
    max_body_bytes: u64,
    api_prefix: String,
    origin: OriginPolicy,
    clients: ClientFilter,
    csrf: CsrfGuard,
    limits: Arc<LimiterSet>,
    abuse: Arc<AbuseAggregator>,
}

impl Pipeline {
    pub fn new(config: &GateConfig, limits: Arc<LimiterSet>, abuse: Arc<AbuseAggregator>) -> Self {
        Self {
            max_body_bytes: config.security.max_body_bytes,
            api_prefix: config.security.api_prefix.clone(),
            origin: OriginPolicy::new(&config.site),
            clients: ClientFilter::new(&config.security.blocked_user_agents),
            csrf: CsrfGuard::new(&config.csrf),
            limits,
            abuse,
        }
    }

    pub fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    pub fn limits(&self) -> &Arc<LimiterSet> {
        &self.limits
    }

    fn on_api_surface(&self, path: &str) -> bool {
        path.starts_with(&self.api_prefix)
    }

    pub fn inspect(&self, request: &InboundRequest) -> Verdict {
        let source = request.source_identifier();
        match self.admit(request, &source) {
            Ok(admission) => Verdict::Forward(admission),
            Err(err) => {
                self.record_rejection(&err, &source, &request.path);
                Verdict::Reject(err)
            }
        }
    }

    fn admit(&self, request: &InboundRequest, source: &str) -> Result<Admission, GateError> {
        check_body_size(request.body_length, self.max_body_bytes)?;

        let mut rate_headers = None;
        if self.on_api_surface(&request.path) {
            self.origin.check(request)?;
            self.clients.check(request)?;

            if let Some(global) = self.limits.global() {
                let decision = global.check(source);
                if !decision.allowed {
                    return Err(GateError::RateLimited {
                        decision,
                        strict: global.strict_headers(),
                    });
                }
                if global.strict_headers() {
                    rate_headers = Some(decision);
                }
            }
        }

        let csrf_token = match self.csrf.inspect(request) {
            CsrfOutcome::Issue(token) => Some(token),
            CsrfOutcome::Pass | CsrfOutcome::Exempt => None,
            CsrfOutcome::Reject(failure) => return Err(GateError::CsrfRejected(failure)),
        };

        Ok(Admission {
            source: source.to_string(),
            csrf_token,
            rate_headers,
        })
    }

    /// Log, count and feed a rejection to the abuse aggregator. Also used by
    /// handlers for rejections raised after admission.
    pub fn record_rejection(&self, err: &GateError, source: &str, path: &str) {
        metrics::record_rejection(err.reason());
        tracing::warn!(
            source = %source,
            path = %path,
            status = err.status().as_u16(),
            reason = err.reason(),
            error = %err,
            "Request rejected"
        );
        if let Some(kind) = err.abuse_kind() {
            self.abuse.record(AbuseEvent::new(kind, source, path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::abuse::AbuseKind;
    use crate::security::csrf::CsrfFailure;

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0";

    fn pipeline_with(config: &GateConfig) -> (Pipeline, Arc<AbuseAggregator>) {
        let limits = Arc::new(LimiterSet::from_config(&config.rate_limit));
        let abuse = Arc::new(AbuseAggregator::new(&config.abuse));
        (Pipeline::new(config, limits, abuse.clone()), abuse)
    }

    fn pipeline() -> (Pipeline, Arc<AbuseAggregator>) {
        pipeline_with(&GateConfig::default())
    }

    fn api_post(path: &str) -> InboundRequest {
        InboundRequest::new("POST", path)
            .with_header("user-agent", BROWSER)
            .with_header("x-forwarded-for", "203.0.113.9")
            .with_cookie("voidspace_csrf", "tok")
            .with_header("x-csrf-token", "tok")
    }

    fn rejection(verdict: Verdict) -> GateError {
        match verdict {
            Verdict::Reject(err) => err,
            Verdict::Forward(a) => panic!("expected rejection, got {a:?}"),
        }
    }

    #[test]
    fn test_valid_mutation_forwarded() {
        let (p, abuse) = pipeline();
        let Verdict::Forward(admission) = p.inspect(&api_post("/api/projects")) else {
            panic!("expected forward");
        };
        assert_eq!(admission.source, "203.0.113.9");
        assert!(admission.csrf_token.is_none());
        assert!(abuse.is_empty());
    }

    #[test]
    fn test_oversized_body_checked_first() {
        let (p, abuse) = pipeline();
        // Also carries a bad origin; size wins
        let req = api_post("/api/projects")
            .with_header("origin", "https://evil.io")
            .with_body_length(2 * 1024 * 1024);
        let err = rejection(p.inspect(&req));
        assert!(matches!(err, GateError::PayloadTooLarge { .. }));
        assert_eq!(
            abuse.summarize().by_kind.get(&AbuseKind::OversizedRequest),
            Some(&1)
        );
    }

    #[test]
    fn test_origin_mismatch_rejected_on_api() {
        let (p, abuse) = pipeline();
        let req = api_post("/api/projects").with_header("origin", "https://evil.io");
        assert!(matches!(rejection(p.inspect(&req)), GateError::OriginMismatch { .. }));
        assert_eq!(abuse.summarize().by_kind.get(&AbuseKind::CsrfFailure), Some(&1));
    }

    #[test]
    fn test_blocked_agent_rejected_on_api_only() {
        let (p, _) = pipeline();
        let req = api_post("/api/projects").with_header("user-agent", "sqlmap/1.7");
        assert!(matches!(rejection(p.inspect(&req)), GateError::BlockedClient));

        let page = InboundRequest::new("GET", "/dashboard").with_header("user-agent", "curl/8");
        assert!(matches!(p.inspect(&page), Verdict::Forward(_)));
    }

    #[test]
    fn test_global_limit_rejects_with_retry() {
        let mut config = GateConfig::default();
        config.rate_limit.global.limit = 2;
        config.rate_limit.global.strict_headers = true;
        let (p, abuse) = pipeline_with(&config);

        let Verdict::Forward(first) = p.inspect(&api_post("/api/projects")) else {
            panic!("expected forward");
        };
        assert_eq!(first.rate_headers.map(|d| d.remaining), Some(1));
        assert!(matches!(p.inspect(&api_post("/api/projects")), Verdict::Forward(_)));

        let err = rejection(p.inspect(&api_post("/api/projects")));
        let GateError::RateLimited { decision, strict } = err else {
            panic!("expected rate limit");
        };
        assert!(strict);
        assert!(decision.retry_after_secs().is_some());
        assert_eq!(abuse.summarize().by_kind.get(&AbuseKind::RateLimit), Some(&1));
    }

    #[test]
    fn test_csrf_enforced_and_exempt_paths_skip() {
        let (p, _) = pipeline();
        let req = InboundRequest::new("POST", "/api/projects")
            .with_header("user-agent", BROWSER)
            .with_cookie("voidspace_csrf", "tok");
        assert!(matches!(
            rejection(p.inspect(&req)),
            GateError::CsrfRejected(CsrfFailure::MissingHeader)
        ));

        let cron = InboundRequest::new("POST", "/api/cron/maintenance").with_header("user-agent", BROWSER);
        assert!(matches!(p.inspect(&cron), Verdict::Forward(_)));
    }

    #[test]
    fn test_safe_request_gets_csrf_token() {
        let (p, _) = pipeline();
        let Verdict::Forward(admission) = p.inspect(&InboundRequest::new("GET", "/")) else {
            panic!("expected forward");
        };
        assert!(admission.csrf_token.is_some());
        assert_eq!(admission.source, "unknown");
    }
}
