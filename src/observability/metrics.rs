//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request metrics
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `littletools_requests_total` (counter): requests by method, status, outcome
//! - `littletools_request_duration_seconds` (histogram): latency by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Outcome is a small fixed set (`handled`, `static`, `not_found`,
//!   `rejected`, `timeout`) and extension methods collapse to `OTHER`, so
//!   label cardinality stays bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "littletools_requests_total";
pub const REQUEST_DURATION: &str = "littletools_request_duration_seconds";

/// Install the Prometheus exporter, serving `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Total HTTP requests handled");
    describe_histogram!(
        REQUEST_DURATION,
        Unit::Seconds,
        "Time from request arrival to response"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method_label(method),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(REQUEST_DURATION, "outcome" => outcome).record(start.elapsed().as_secs_f64());
}

fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}
