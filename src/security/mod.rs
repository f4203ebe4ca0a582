//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → hosts.rs (Host / X-Forwarded-Host allowlist)
//!     → content_type.rs (non-GET must be application/json)
//!     → Pass to routing
//!
//! Handler about to fetch on a caller's behalf:
//!     → address_policy.rs (deny private, loopback and metadata targets)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Inbound checks are blanket policy, not per-route

pub mod address_policy;
pub mod content_type;
pub mod hosts;

pub use address_policy::{AddressPolicy, Decision, IpPrefix};
pub use hosts::AllowedHosts;
