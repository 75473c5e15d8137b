//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `session.secret`.
pub const SESSION_SECRET_ENV_VAR: &str = "GATE_SESSION_SECRET";
/// Environment variable overriding `cron.secret`.
pub const CRON_SECRET_ENV_VAR: &str = "GATE_CRON_SECRET";
/// Environment variable overriding `admin.api_key`.
pub const ADMIN_API_KEY_ENV_VAR: &str = "GATE_ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate a TOML document.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let mut config: GateConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn load_defaults() -> Result<GateConfig, ConfigError> {
    let mut config = GateConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay secrets from the environment. `lookup` is injectable for tests.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(SESSION_SECRET_ENV_VAR) {
        config.session.secret = secret;
    }
    if let Some(secret) = lookup(CRON_SECRET_ENV_VAR) {
        config.cron.secret = Some(secret);
    }
    if let Some(key) = lookup(ADMIN_API_KEY_ENV_VAR) {
        config.admin.api_key = key;
    }
}
