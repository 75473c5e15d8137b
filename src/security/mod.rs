//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → pipeline.rs (orchestrates the checks below, short-circuits on failure)
//!         → limits.rs (declared body size)
//!         → origin.rs (Origin / Referer against the site origin)
//!         → client_filter.rs (user-agent deny-list)
//!         → rate_limit.rs (global per-IP limiter)
//!         → csrf.rs (double-submit token)
//!     → abuse.rs (every rejection is recorded)
//!     → headers.rs (security response headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Each limiter, the CSRF guard and the abuse buffer own their state
//!   exclusively; nothing else reads or mutates it
//! - All state is in-memory and best-effort; a restart clears it

pub mod abuse;
pub mod bearer;
pub mod client_filter;
pub mod csrf;
pub mod headers;
pub mod limits;
pub mod origin;
pub mod pipeline;
pub mod rate_limit;

pub use abuse::{AbuseAggregator, AbuseEvent, AbuseKind, AbuseSummary};
pub use csrf::{CsrfFailure, CsrfGuard, CsrfOutcome};
pub use pipeline::{Admission, Pipeline, Verdict};
pub use rate_limit::{Decision, LimiterSet, RateLimiter, Strategy};
