//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Proxy targets denied when the operator supplies no list of their own.
///
/// Private network ranges, loopback/unspecified addresses and the EC2
/// instance metadata endpoints (IPv4 and IPv6).
pub const DEFAULT_PROXY_DISALLOWED: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "fd00::/8",
    "localhost",
    "0.0.0.0/32",
    "127.0.0.1/32",
    "[::]",
    "169.254.169.254/32",
    "[fd00:ec2::254]",
];

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind target).
    pub listener: ListenerConfig,

    /// Inbound host allowlist.
    pub hosts: HostsConfig,

    /// Outbound proxy target denylist.
    pub proxy: ProxyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Static asset serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind target: `host:port`, `:port` or `unix/<socket path>`.
    pub bind: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: ":3061".to_string(),
        }
    }
}

/// Hostnames the server answers to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Exact, case-sensitive hostnames (no port).
    pub allowed: Vec<String>,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            allowed: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Outbound request policy for handlers that fetch on a caller's behalf.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Each entry is a literal host, an IP address or a CIDR prefix.
    pub disallowed: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            disallowed: DEFAULT_PROXY_DISALLOWED
                .iter()
                .map(|entry| entry.to_string())
                .collect(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole request, shared with handler work, in seconds.
    pub request_secs: u64,

    /// Outbound connection establishment timeout in seconds.
    pub outbound_connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            outbound_connect_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory holding the frontend build. Unset disables asset serving.
    pub root: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum buffered request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
