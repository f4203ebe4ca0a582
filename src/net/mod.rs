//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! bind target (config / --bind)
//!     → listener.rs (parse, bind TCP or Unix socket)
//!     → Hand off to HTTP layer (axum::serve)
//! ```
//!
//! # Design Decisions
//! - Unix sockets let a fronting proxy reach the server without a port
//! - A stale socket file from a crashed run never blocks startup

pub mod listener;

pub use listener::{BindTarget, Listener, ListenerError};
