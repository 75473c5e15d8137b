//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → HTTP server, admin server and sweepers stop
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting, drain in-flight requests, join sweepers
//! - In-memory limiter and abuse state is dropped on exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
