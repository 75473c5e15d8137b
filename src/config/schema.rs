//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::rate_limit::Strategy;

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Identity of the protected site (domain, origin).
    pub site: SiteConfig,

    /// Session credential settings.
    pub session: SessionConfig,

    /// Double-submit CSRF settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request hardening settings.
    pub security: SecurityConfig,

    /// Abuse aggregation settings.
    pub abuse: AbuseConfig,

    /// Sign-in settings.
    pub auth: AuthConfig,

    /// Background job trigger settings.
    pub cron: CronConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The site this gate protects.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Canonical domain. Sign-in payloads must name it as their recipient.
    pub domain: String,

    /// Canonical origin (scheme + host) compared against `Origin`/`Referer`.
    pub origin: String,

    /// Additional origins accepted by the origin check (previews, local dev).
    pub extra_origins: Vec<String>,

    /// Production mode: `Secure` cookies and HSTS.
    pub production: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain: "voidspace.io".to_string(),
            origin: "https://voidspace.io".to_string(),
            extra_origins: Vec::new(),
            production: true,
        }
    }
}

/// Session credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret. Empty means an ephemeral secret is generated at startup.
    pub secret: String,

    /// Session cookie name.
    pub cookie_name: String,

    /// Credential lifetime in seconds.
    pub lifetime_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "voidspace_session".to_string(),
            lifetime_secs: 7 * 24 * 3600,
        }
    }
}

/// CSRF double-submit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie carrying the token (readable by client script).
    pub cookie_name: String,

    /// Request header that must echo the cookie on unsafe methods.
    pub header_name: String,

    /// Random bytes per token (hex-encoded on the wire).
    pub token_bytes: usize,

    /// Paths authenticated by a static bearer secret instead of cookies.
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "voidspace_csrf".to_string(),
            header_name: "x-csrf-token".to_string(),
            token_bytes: 32,
            exempt_paths: vec![
                "/api/cron/maintenance".to_string(),
                "/api/health".to_string(),
            ],
        }
    }
}

/// A single admission rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitRule {
    /// Enable this limiter.
    pub enabled: bool,

    /// Requests admitted per window.
    pub limit: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Ceiling on distinct tracked keys.
    pub max_keys: usize,

    /// Counting strategy.
    pub strategy: Strategy,

    /// Emit `X-RateLimit-*` headers.
    pub strict_headers: bool,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 120,
            window_ms: 60_000,
            max_keys: 10_000,
            strategy: Strategy::FixedBucket,
            strict_headers: false,
        }
    }
}

/// A limiter dedicated to one action (e.g. sign-in).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteLimitConfig {
    /// Action name, also used as the key prefix.
    pub action: String,

    #[serde(flatten)]
    pub rule: RateLimitRule,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Per-IP limiter applied to the whole API surface.
    pub global: RateLimitRule,

    /// Per-action limiters.
    pub routes: Vec<RouteLimitConfig>,

    /// Interval between expired-entry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: RateLimitRule::default(),
            routes: vec![RouteLimitConfig {
                action: "auth.login".to_string(),
                rule: RateLimitRule {
                    enabled: true,
                    limit: 10,
                    window_ms: 60_000,
                    max_keys: 10_000,
                    strategy: Strategy::SlidingLog,
                    strict_headers: true,
                },
            }],
            sweep_interval_secs: 60,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes.
    pub max_body_bytes: u64,

    /// Path prefix of the authenticated/mutating surface.
    pub api_prefix: String,

    /// User-agent substrings rejected on the API surface. An empty entry
    /// matches a missing or blank user agent.
    pub blocked_user_agents: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let blocked = [
            "", "curl", "wget", "python-requests", "python-urllib", "go-http-client", "libwww-perl",
            "httpclient", "scrapy", "nikto", "sqlmap", "nmap", "masscan", "zgrab",
        ];
        Self {
            enable_headers: true,
            max_body_bytes: 1024 * 1024, // 1MB
            api_prefix: "/api/".to_string(),
            blocked_user_agents: blocked.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Abuse aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Trailing window in seconds.
    pub window_secs: u64,

    /// Buffered events that trigger an alert.
    pub threshold: usize,

    /// Minimum seconds between alerts.
    pub cooldown_secs: u64,

    /// Hard cap on buffered events.
    pub max_events: usize,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            threshold: 50,
            cooldown_secs: 900,
            max_events: 10_000,
        }
    }
}

/// Sign-in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Largest accepted signed message, in bytes.
    pub max_message_bytes: usize,

    /// Largest accepted base64 signature, in characters.
    pub max_signature_len: usize,

    /// Largest accepted public key string, in characters.
    pub max_public_key_len: usize,

    /// Reject sign-ins that reuse a nonce.
    pub nonce_replay_protection: bool,

    /// How long a used nonce is remembered.
    pub nonce_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 4096,
            max_signature_len: 256,
            max_public_key_len: 128,
            nonce_replay_protection: false,
            nonce_ttl_secs: 900,
        }
    }
}

/// Background job trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CronConfig {
    /// Bearer secret. The trigger is refused while unset.
    pub secret: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder admin key; validation refuses it while admin is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
