//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides for secrets)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets may come from the environment instead of the file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_defaults, ConfigError};
pub use schema::{
    AbuseConfig, AdminConfig, AuthConfig, CronConfig, CsrfConfig, GateConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RateLimitRule, RouteLimitConfig, SecurityConfig,
    SessionConfig, SiteConfig, TimeoutConfig,
};
