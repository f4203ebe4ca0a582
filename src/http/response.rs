//! Response construction.
//!
//! # Responsibilities
//! - JSON responses with a fallback when encoding fails
//! - Structured error bodies: `{"error": {"code": .., "message": ..}}`
//! - Legacy single-string error bodies: `{"error": ".."}`
//! - Redirects with a small HTML body for clients that do not follow them
//!
//! # Design Decisions
//! - Encoding failures are logged and still produce a body; a request is
//!   never left without a response

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::security::content_type::APPLICATION_JSON;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct LegacyErrorBody<'a> {
    error: &'a str,
}

/// Serialize `data` as the JSON body of a `status` response.
pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Response {
    let body = match serde_json::to_vec(data) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Error writing JSON response");
            fallback_error_body(&e.to_string())
        }
    };

    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(APPLICATION_JSON),
    );
    response
}

/// `{"error": {"code": code, "message": message}}`
pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    json(
        status,
        &ErrorBody {
            error: ErrorDetail { code, message },
        },
    )
}

/// `{"error": message}`, the older single-string form.
pub fn legacy_error(status: StatusCode, message: &str) -> Response {
    json(status, &LegacyErrorBody { error: message })
}

pub fn plain(status: StatusCode, text: &'static str) -> Response {
    (status, text).into_response()
}

/// 302 to `to`, with `Referrer-Policy: no-referrer` so flow state carried in
/// the current URL does not leak to the target.
pub fn redirect(to: &str) -> Response {
    let escaped = escape_html(to);
    let html = format!(
        "<!doctype html>\n<title>Redirecting...</title>\n<h1>Redirecting...</h1>\n\
         <p>You should be redirected automatically to target URL: <a href=\"{0}\">{0}</a>. \
         If not click the link.</p>\n",
        escaped
    );

    let location = match HeaderValue::from_str(to) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Redirect target is not a valid header value");
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid-redirect",
                "Redirect target is not a valid URL",
            );
        }
    };

    let mut response = Response::new(Body::from(html));
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn fallback_error_body(message: &str) -> Vec<u8> {
    // Serializing a single string cannot fail.
    serde_json::to_vec(&LegacyErrorBody { error: message })
        .unwrap_or_else(|_| br#"{"error":"internal error"}"#.to_vec())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
