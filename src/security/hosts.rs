//! Inbound `Host` allowlist.
//!
//! Guards handlers that trust `Host` against DNS rebinding: a request is only
//! served when its bare hostname is listed verbatim in the configuration.

use std::collections::HashSet;

use axum::http::{header, request::Parts, HeaderMap, Uri};

/// Header set by a fronting reverse proxy; preferred over `Host` when present.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Clone)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Returns the offending hostname when the request is not allowed.
    pub fn check(&self, parts: &Parts) -> Result<(), String> {
        let host = effective_host(&parts.headers, &parts.uri);
        let host = strip_port(&host);
        if self.contains(host) {
            Ok(())
        } else {
            Err(host.to_string())
        }
    }
}

/// `X-Forwarded-Host`, else `Host`, else the request-target authority.
pub fn effective_host(headers: &HeaderMap, uri: &Uri) -> String {
    header_str(headers, X_FORWARDED_HOST)
        .or_else(|| header_str(headers, header::HOST))
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}

fn header_str<K: header::AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Drop a `:port` suffix. Bracketed IPv6 literals yield the inner address.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, _)) => addr,
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}
