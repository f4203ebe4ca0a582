//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / Unix connection
//!     → server.rs (Axum setup, request ID, dispatch)
//!     → routing (regex route table, first match wins)
//!     → exchange.rs (per-request context handed to the handler)
//!         → client.rs (outbound calls, after the address policy check)
//!     → response.rs (JSON, structured errors, redirects)
//!     → Send to client
//!
//! Unmatched GET:
//!     → static_files.rs (assets, SPA index fallback)
//! ```

pub mod client;
pub mod exchange;
pub mod response;
pub mod server;
pub mod static_files;

pub use client::{HttpClient, OutboundError, OutboundRequest, OutboundResponse, ReqwestClient};
pub use exchange::{handler, Exchange, Handler, HandlerFuture};
pub use server::HttpServer;
