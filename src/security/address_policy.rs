//! Outbound target policy (SSRF defense).
//!
//! # Responsibilities
//! - Parse the configured denylist into literal hosts and CIDR prefixes
//! - Decide whether a host/address may be contacted on a caller's behalf
//!
//! # Design Decisions
//! - Pure and immutable: safe to share across requests without locking
//! - IP literals are checked against prefixes only; everything else is an
//!   exact, case-sensitive lookup in the literal host set
//! - No DNS resolution. A hostname that resolves to a denied address is
//!   NOT caught here; callers must not follow redirects to compensate
//! - Advisory: handlers call it before outbound requests, the router does not

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A CIDR network prefix such as `10.0.0.0/8` or `fd00::/8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPrefix {
    network: IpAddr,
    len: u8,
}

impl IpPrefix {
    /// Build a prefix, masking host bits. Returns `None` when `len` exceeds
    /// the address width.
    pub fn new(addr: IpAddr, len: u8) -> Option<Self> {
        let network = match addr {
            IpAddr::V4(v4) => {
                if len > 32 {
                    return None;
                }
                IpAddr::V4((u32::from(v4) & v4_mask(len)).into())
            }
            IpAddr::V6(v6) => {
                if len > 128 {
                    return None;
                }
                IpAddr::V6((u128::from(v6) & v6_mask(len)).into())
            }
        };
        Some(Self { network, len })
    }

    /// The prefix covering exactly one address.
    pub fn single(addr: IpAddr) -> Self {
        let len = if addr.is_ipv4() { 32 } else { 128 };
        Self { network: addr, len }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => u32::from(a) & v4_mask(self.len) == u32::from(net),
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                u128::from(a) & v6_mask(self.len) == u128::from(net)
            }
            _ => false,
        }
    }

    /// An IPv4-mapped IPv6 prefix (`::ffff:a.b.c.d/len`, len >= 96) as the
    /// equivalent IPv4 prefix.
    pub fn to_canonical(self) -> Self {
        match self.network {
            IpAddr::V6(v6) if self.len >= 96 => match v6.to_ipv4_mapped() {
                Some(v4) => Self {
                    network: IpAddr::V4(v4),
                    len: self.len - 96,
                },
                None => self,
            },
            _ => self,
        }
    }

    /// Two prefixes overlap when either contains the other's network address.
    pub fn overlaps(&self, other: &IpPrefix) -> bool {
        self.contains(other.network) || other.contains(self.network)
    }
}

fn v4_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(len))
    }
}

fn v6_mask(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(len))
    }
}

/// Error returned when a string is not `address/length`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CIDR prefix: {0:?}")]
pub struct InvalidPrefix(String);

impl FromStr for IpPrefix {
    type Err = InvalidPrefix;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let len: u8 = len.parse().map_err(|_| invalid())?;
        IpPrefix::new(addr, len).ok_or_else(invalid)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

/// Outcome of evaluating a candidate against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permitted,
    /// The address falls inside a disallowed network.
    DeniedPrefix(IpPrefix),
    /// The name is listed verbatim in the disallowed hosts.
    DeniedHost,
}

impl Decision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Decision::Permitted)
    }
}

/// Immutable denylist of outbound targets.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    hosts: HashSet<String>,
    prefixes: Vec<IpPrefix>,
}

impl AddressPolicy {
    /// Build the policy from configured entries.
    ///
    /// Each entry is trimmed and may be wrapped in `[ ]`. IP addresses become
    /// single-address prefixes, `ip/len` becomes a prefix, anything else a
    /// literal host.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();

        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let bare = strip_brackets(entry);
            if let Ok(addr) = bare.parse::<IpAddr>() {
                policy.prefixes.push(IpPrefix::single(addr.to_canonical()));
            } else if let Ok(prefix) = bare.parse::<IpPrefix>() {
                policy.prefixes.push(prefix);
            } else {
                policy.hosts.insert(entry.to_string());
            }
        }

        policy
    }

    pub fn is_permitted(&self, candidate: &str) -> bool {
        self.evaluate(candidate).is_permitted()
    }

    /// Evaluate `candidate` (a hostname, IP literal or CIDR prefix).
    pub fn evaluate(&self, candidate: &str) -> Decision {
        let candidate = candidate.trim();
        let bare = strip_brackets(candidate);

        if let Ok(addr) = bare.parse::<IpAddr>() {
            let addr = addr.to_canonical();
            return match self.prefixes.iter().find(|p| p.contains(addr)) {
                Some(prefix) => Decision::DeniedPrefix(*prefix),
                None => Decision::Permitted,
            };
        }

        if let Ok(range) = bare.parse::<IpPrefix>() {
            let range = range.to_canonical();
            return match self.prefixes.iter().find(|p| p.overlaps(&range)) {
                Some(prefix) => Decision::DeniedPrefix(*prefix),
                None => Decision::Permitted,
            };
        }

        if self.hosts.contains(candidate) {
            Decision::DeniedHost
        } else {
            Decision::Permitted
        }
    }

    pub fn prefixes(&self) -> &[IpPrefix] {
        &self.prefixes
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s)
}
