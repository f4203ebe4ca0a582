//! Runtime view of the configuration.
//!
//! Built once from a validated `AppConfig` before the listener starts, then
//! shared read-only (behind `Arc`) by every request.

use std::path::Path;
use std::time::Duration;

use crate::config::schema::AppConfig;
use crate::security::{AddressPolicy, AllowedHosts};

#[derive(Debug, Clone)]
pub struct Settings {
    config: AppConfig,
    allowed_hosts: AllowedHosts,
    address_policy: AddressPolicy,
}

impl Settings {
    pub fn new(config: AppConfig) -> Self {
        let allowed_hosts = AllowedHosts::new(config.hosts.allowed.iter().map(|h| h.trim().to_string()));
        let address_policy = AddressPolicy::from_entries(&config.proxy.disallowed);

        tracing::debug!(
            allowed_hosts = config.hosts.allowed.len(),
            disallowed_prefixes = address_policy.prefixes().len(),
            disallowed_hosts = address_policy.hosts().count(),
            "Settings compiled"
        );

        Self {
            config,
            allowed_hosts,
            address_policy,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn allowed_hosts(&self) -> &AllowedHosts {
        &self.allowed_hosts
    }

    pub fn address_policy(&self) -> &AddressPolicy {
        &self.address_policy
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.request_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.config.security.max_body_size
    }

    pub fn static_root(&self) -> Option<&Path> {
        self.config.static_files.root.as_deref().map(Path::new)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
