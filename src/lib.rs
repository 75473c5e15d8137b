//! Request authentication and abuse-mitigation gate for Voidspace.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GateConfig;
pub use error::GateError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
