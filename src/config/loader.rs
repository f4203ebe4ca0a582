//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Bind target override, e.g. `127.0.0.1:3061`, `:3061` or `unix//run/lt.sock`.
pub const ENV_BIND: &str = "LT_BIND";
/// Port-only bind override used when `LT_BIND` is unset (PaaS convention).
pub const ENV_PORT: &str = "PORT";
pub const ENV_ALLOWED_HOSTS: &str = "PRESTIGE_ALLOWED_HOSTS";
pub const ENV_PROXY_DISALLOWED_HOSTS: &str = "PRESTIGE_PROXY_DISALLOWED_HOSTS";
pub const ENV_STATIC_ROOT: &str = "STATIC_ROOT";

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
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    let config = apply_env(config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` is injected so the overlay can be exercised without touching the
/// real process environment.
pub fn apply_env<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(ENV_BIND).filter(|v| !v.is_empty()) {
        Some(bind) => config.listener.bind = bind,
        None => {
            if let Some(port) = lookup(ENV_PORT) {
                config.listener.bind = format!(":{}", port);
            }
        }
    }

    if let Some(raw) = lookup(ENV_ALLOWED_HOSTS) {
        let hosts = split_list(&raw);
        // An empty list keeps the loopback defaults rather than locking everyone out.
        if !hosts.is_empty() {
            config.hosts.allowed = hosts;
        }
    }

    if let Some(raw) = lookup(ENV_PROXY_DISALLOWED_HOSTS) {
        let entries = split_list(&raw);
        if !entries.is_empty() {
            config.proxy.disallowed = entries;
        }
    }

    if let Some(root) = lookup(ENV_STATIC_ROOT).filter(|v| !v.is_empty()) {
        config.static_files.root = Some(root);
    }

    config
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
