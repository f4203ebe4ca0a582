//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request path
//!     → router.rs (ordered scan)
//!     → matcher.rs (anchored regex, named captures)
//!     → Return: matched Route + fields, or NoMatch
//!
//! Route Compilation (at startup):
//!     register(pattern, handler) in program order
//!     → Compile anchored regex (fatal on error)
//!     → Freeze as immutable RouteTable behind Arc
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod matcher;
pub mod router;

pub use matcher::{Fields, PathPattern, RouteError};
pub use router::{Route, RouteMatch, RouteTable};
