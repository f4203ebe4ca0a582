//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Reject lists that would leave the server unusable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind must not be empty")]
    EmptyBindTarget,

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("hosts.allowed must list at least one hostname")]
    NoAllowedHosts,

    #[error("proxy.disallowed must not be empty; omit it to keep the default denylist")]
    NoDisallowedEntries,

    #[error("proxy.disallowed entry {index} is empty")]
    EmptyDisallowedEntry { index: usize },

    #[error("observability.log_format must be \"pretty\" or \"json\", got {0:?}")]
    UnknownLogFormat(String),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bind = config.listener.bind.trim();
    if bind.is_empty() || bind == "unix/" {
        errors.push(ValidationError::EmptyBindTarget);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.request_secs",
        });
    }
    if config.timeouts.outbound_connect_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.outbound_connect_secs",
        });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::NotPositive {
            field: "security.max_body_size",
        });
    }

    if config.hosts.allowed.iter().all(|h| h.trim().is_empty()) {
        errors.push(ValidationError::NoAllowedHosts);
    }

    if config.proxy.disallowed.is_empty() {
        errors.push(ValidationError::NoDisallowedEntries);
    }
    for (index, entry) in config.proxy.disallowed.iter().enumerate() {
        if entry.trim().is_empty() {
            errors.push(ValidationError::EmptyDisallowedEntry { index });
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
