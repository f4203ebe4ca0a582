//! Blanket content-type rule.
//!
//! Every method other than `GET` must declare an `application/json` body.
//! Browsers cannot send that content type cross-origin without a CORS
//! preflight, so form posts from foreign pages never reach a handler.

use axum::http::{header, HeaderMap, Method};

pub const APPLICATION_JSON: &str = "application/json";

/// The media type of `Content-Type`, without parameters.
pub fn media_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim())
}

pub fn is_acceptable(method: &Method, headers: &HeaderMap) -> bool {
    *method == Method::GET || media_type(headers) == Some(APPLICATION_JSON)
}
