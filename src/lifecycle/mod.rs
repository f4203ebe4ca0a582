//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Register routes → Bind listener → Serve
//!
//! Shutdown:
//!     SIGINT / SIGTERM / Shutdown::trigger
//!         → signals.rs → stop accepting → drain in-flight requests
//!         → remove Unix socket file → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
