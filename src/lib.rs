//! littletools: a small HTTP server of developer utilities.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ http::server (dispatch)
//!                                          │  * target / Host / Content-Type checks
//!                                          ▼
//!                                     routing::RouteTable (regex, first match)
//!                                          │                        │ no match, GET
//!                                          ▼                        ▼
//!                                     handlers::*            http::static_files
//!                                          │
//!                                          │ outbound calls, after
//!                                          ▼ security::AddressPolicy
//!                                     http::client (reqwest)
//!
//!     Cross-cutting: config (TOML + env), observability (tracing, metrics),
//!     lifecycle (signals, shutdown)
//! ```

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::{AppConfig, Settings};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
