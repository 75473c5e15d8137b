//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → middleware/pipeline.rs (request.rs snapshot → security pipeline)
//!     → middleware/session.rs (verify / rotate session cookie)
//!     → auth.rs | maintenance.rs (handlers)
//!     → cookies.rs, response.rs (Set-Cookie, rate limit headers)
//!     → Send to client
//! ```

pub mod auth;
pub mod cookies;
pub mod maintenance;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
