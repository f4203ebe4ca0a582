//! Content-Security-Policy inspector.
//!
//! Fetches a page on behalf of the caller and reports the CSP headers it
//! was served with. The target host goes through the address policy first.

use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde::Serialize;
use url::Url;

use crate::http::{Exchange, OutboundRequest};

const CSP_HEADER: &str = "content-security-policy";

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CspReport {
    Found { ok: bool, values: Vec<String> },
    Missing { ok: bool, error: &'static str },
}

/// `GET /api/csp?url=<url>`
pub async fn csp(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::GET) {
        return response;
    }

    let raw = match ex.query_param_single("url") {
        Ok(raw) if !raw.trim().is_empty() => raw,
        Ok(_) => {
            return ex.respond_error(StatusCode::BAD_REQUEST, "missing-url", "url is required")
        }
        Err(e) => return ex.respond_error(StatusCode::BAD_REQUEST, "missing-url", &e.to_string()),
    };

    let url = match target_url(&raw) {
        Some(url) => url,
        None => {
            return ex.respond_error(
                StatusCode::BAD_REQUEST,
                "invalid-url",
                &format!("Could not parse URL {:?}", raw.trim()),
            )
        }
    };

    let host = url.host_str().unwrap_or_default();
    if !ex.is_address_allowed_for_proxy(host) {
        return ex.respond_error(
            StatusCode::BAD_REQUEST,
            "host-not-allowed",
            &format!("Host {:?} is not allowed", host),
        );
    }

    let response = match ex.http_do(OutboundRequest::get(url.clone())).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "CSP fetch failed");
            return ex.respond_error(StatusCode::BAD_GATEWAY, "fetch-failed", &e.to_string());
        }
    };

    let values = response.header_values(CSP_HEADER);
    let report = if values.is_empty() {
        CspReport::Missing {
            ok: true,
            error: "no csp",
        }
    } else {
        CspReport::Found { ok: true, values }
    };
    ex.respond(StatusCode::OK, &report)
}

/// Scheme-less input is taken as `http://`. Only http(s) URLs with a host
/// are accepted. Host normalisation (lowercasing, numeric IPv4 forms) is
/// done by `Url` before the policy sees it.
fn target_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let with_scheme = if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&with_scheme).ok()?;
    match (url.scheme(), url.host_str()) {
        ("http" | "https", Some(host)) if !host.is_empty() => Some(url),
        _ => None,
    }
}

/// True when `raw` opens with `<scheme>://`. A `://` later in the path or
/// query does not count.
fn has_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
