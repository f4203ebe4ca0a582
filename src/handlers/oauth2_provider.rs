//! Mock OAuth 2.0 authorization server.
//!
//! `authorize` sends the browser to the consent page of the frontend;
//! the consent page posts the user's decision back, and `decide` redirects
//! to the client's `redirect_uri` with a canned code or token.

use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use url::Url;

use super::codec;
use crate::http::{response, Exchange};

const CONSENT_PATH: &str = "/oauth2-provider-consent";

#[derive(Debug, Serialize)]
struct ConsentInfo {
    redirect_uri: String,
    response_type: String,
    state: String,
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DecisionPayload {
    redirect_uri: String,
    response_type: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    scope: String,
}

/// `GET /api/oauth2-provider/authorize`
pub async fn authorize(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::GET) {
        return response;
    }

    let param = |name: &str| ex.query_param_single(name).ok().unwrap_or_default();

    let Some(redirect) = http_url(&param("redirect_uri")) else {
        return response::plain(StatusCode::BAD_REQUEST, "Invalid redirect_uri");
    };

    let response_type = param("response_type");
    if response_type.is_empty() {
        return response::plain(StatusCode::BAD_REQUEST, "Invalid response_type");
    }
    if matches!(response_type.as_str(), "code" | "token") && param("client_id").is_empty() {
        return response::plain(StatusCode::BAD_REQUEST, "Invalid client_id");
    }

    let consent = ConsentInfo {
        redirect_uri: redirect.to_string(),
        response_type,
        state: param("state"),
        scopes: param("scope").split_whitespace().map(str::to_string).collect(),
    };

    match codec::encode(&consent) {
        Ok(packed) => {
            let origin = redirect.origin().ascii_serialization();
            ex.redirect(&format!("{}{}?{}", origin, CONSENT_PATH, packed))
        }
        Err(e) => ex.respond_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error-encoding-consent",
            &e.to_string(),
        ),
    }
}

/// `POST /api/oauth2-provider/authorize/(allow|deny)`
pub async fn decide(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::POST) {
        return response;
    }

    let allow = ex.field("decision") == Some("allow");

    let payload: DecisionPayload = match ex.decode_body() {
        Ok(payload) => payload,
        Err(e) => {
            return ex.respond_error(
                StatusCode::BAD_REQUEST,
                "error-decoding-payload",
                &format!("Error decoding payload: {}", e),
            )
        }
    };

    let Some(mut target) = http_url(&payload.redirect_uri) else {
        return response::plain(StatusCode::BAD_REQUEST, "Invalid redirect_uri");
    };
    target.set_query(None);
    target.set_fragment(None);

    let mut params: Vec<(&str, &str)> = Vec::new();
    if !payload.state.is_empty() {
        params.push(("state", payload.state.as_str()));
    }
    if !payload.scope.is_empty() {
        params.push(("scope", payload.scope.as_str()));
    }
    if allow {
        match payload.response_type.as_str() {
            "code" => params.push(("code", "123")),
            "token" => params.extend([("access_token", "456"), ("token_type", "bearer")]),
            _ => params.push(("approved", "true")),
        }
    } else {
        params.push(("error", "access_denied"));
    }

    target.query_pairs_mut().extend_pairs(params);

    tracing::debug!(allow, redirect_uri = %target, "OAuth2 provider decision");
    ex.redirect(target.as_str())
}

fn http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
