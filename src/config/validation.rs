//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lifetimes > 0, limits >= 1)
//! - Detect duplicate limiter names and unusable secrets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::schema::{GateConfig, RateLimitRule, ADMIN_KEY_PLACEHOLDER};

/// Minimum length of a configured session secret.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and collect all failures.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.site.domain.trim().is_empty() {
        errors.push(ValidationError::new("site.domain", "must not be empty"));
    }
    for (i, origin) in std::iter::once(&config.site.origin)
        .chain(config.site.extra_origins.iter())
        .enumerate()
    {
        if Url::parse(origin).is_err() {
            let field = if i == 0 {
                "site.origin".to_string()
            } else {
                format!("site.extra_origins[{}]", i - 1)
            };
            errors.push(ValidationError::new(field, format!("'{origin}' is not a valid origin")));
        }
    }

    let secret_len = config.session.secret.len();
    if secret_len > 0 && secret_len < MIN_SESSION_SECRET_BYTES {
        errors.push(ValidationError::new(
            "session.secret",
            format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes, got {secret_len}"),
        ));
    }
    if config.session.lifetime_secs == 0 {
        errors.push(ValidationError::new("session.lifetime_secs", "must be greater than 0"));
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }

    if config.csrf.cookie_name.is_empty() {
        errors.push(ValidationError::new("csrf.cookie_name", "must not be empty"));
    }
    if config.csrf.header_name.is_empty() {
        errors.push(ValidationError::new("csrf.header_name", "must not be empty"));
    }
    if config.csrf.token_bytes < 16 {
        errors.push(ValidationError::new("csrf.token_bytes", "must be at least 16"));
    }

    validate_rule("rate_limit.global", &config.rate_limit.global, &mut errors);
    let mut actions = HashSet::new();
    for route in &config.rate_limit.routes {
        let field = format!("rate_limit.routes[{}]", route.action);
        if route.action.is_empty() {
            errors.push(ValidationError::new("rate_limit.routes", "action must not be empty"));
        } else if !actions.insert(route.action.as_str()) {
            errors.push(ValidationError::new(field.clone(), "duplicate action"));
        }
        validate_rule(&field, &route.rule, &mut errors);
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }

    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::new("security.max_body_bytes", "must be greater than 0"));
    }
    if !config.security.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("security.api_prefix", "must start with '/'"));
    }

    if config.abuse.threshold == 0 {
        errors.push(ValidationError::new("abuse.threshold", "must be at least 1"));
    }
    if config.abuse.window_secs == 0 {
        errors.push(ValidationError::new("abuse.window_secs", "must be greater than 0"));
    }
    if config.abuse.max_events < config.abuse.threshold {
        errors.push(ValidationError::new("abuse.max_events", "must not be below abuse.threshold"));
    }

    if config.auth.nonce_replay_protection && config.auth.nonce_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.nonce_ttl_secs", "must be greater than 0"));
    }

    if matches!(config.cron.secret.as_deref(), Some(s) if s.is_empty()) {
        errors.push(ValidationError::new("cron.secret", "must not be empty when set"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER)
    {
        errors.push(ValidationError::new("admin.api_key", "must be changed when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_rule(field: &str, rule: &RateLimitRule, errors: &mut Vec<ValidationError>) {
    if !rule.enabled {
        return;
    }
    if rule.limit == 0 {
        errors.push(ValidationError::new(format!("{field}.limit"), "must be at least 1"));
    }
    if rule.window_ms == 0 {
        errors.push(ValidationError::new(format!("{field}.window_ms"), "must be at least 1"));
    }
    if rule.max_keys == 0 {
        errors.push(ValidationError::new(format!("{field}.max_keys"), "must be at least 1"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteLimitConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GateConfig::default();
        config.session.secret = "short".into();
        config.abuse.threshold = 0;
        config.rate_limit.global.limit = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"session.secret"));
        assert!(fields.contains(&"abuse.threshold"));
        assert!(fields.contains(&"rate_limit.global.limit"));
    }

    #[test]
    fn test_duplicate_route_actions() {
        let mut config = GateConfig::default();
        let dup = config.rate_limit.routes[0].clone();
        config.rate_limit.routes.push(dup);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message == "duplicate action"));
    }

    #[test]
    fn test_disabled_rule_is_not_checked() {
        let mut config = GateConfig::default();
        config.rate_limit.routes.push(RouteLimitConfig {
            action: "off".into(),
            rule: RateLimitRule {
                enabled: false,
                limit: 0,
                ..RateLimitRule::default()
            },
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_placeholder_key_rejected() {
        let mut config = GateConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");
    }

    #[test]
    fn test_bad_origin_rejected() {
        let mut config = GateConfig::default();
        config.site.extra_origins.push("not a url".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "site.extra_origins[0]");
    }
}
