//! Liveness endpoint.

use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde::Serialize;

use crate::http::Exchange;

#[derive(Debug, Serialize)]
struct Health {
    ok: bool,
    version: &'static str,
}

/// `GET /api/health`
pub async fn health(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::GET) {
        return response;
    }
    ex.respond(
        StatusCode::OK,
        &Health {
            ok: true,
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
