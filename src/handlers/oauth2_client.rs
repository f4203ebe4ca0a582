//! OAuth 2.0 authorization-code client.
//!
//! # Data Flow
//! ```text
//! POST /api/oauth2-client/start  (JSON form from the UI)
//!     → 302 to authorize URL, flow state packed into `state`
//! provider redirects back
//! GET /api/oauth2-client/verify?code&state
//!     → unpack flow state
//!     → POST code exchange to token URL (address policy checked)
//!     → 302 to /oauth2-result?<packed result>
//! ```
//!
//! # Design Decisions
//! - No server-side session: everything the second leg needs travels in
//!   the `state` parameter
//! - The caller's own `state` value is kept inside the flow state and
//!   handed back in the result

use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::codec;
use crate::http::{Exchange, OutboundRequest, OutboundResponse};
use crate::security::content_type::APPLICATION_JSON;

const RESULT_PATH: &str = "/oauth2-result";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StartPayload {
    authorize_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    token_url: String,
    #[serde(default)]
    state: String,
}

/// Carried through the provider in the `state` query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FlowState {
    #[serde(default)]
    state: String,
    #[serde(rename = "authorizeURL", default)]
    authorize_url: String,
    #[serde(rename = "tokenURL", default)]
    token_url: Option<String>,
    #[serde(rename = "clientID", default)]
    client_id: String,
    #[serde(rename = "clientSecret", default)]
    client_secret: String,
    #[serde(rename = "redirectURI", default)]
    redirect_uri: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    body: serde_json::Value,
    content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowResult {
    time: String,
    authorize_response: BTreeMap<String, String>,
    token_response: TokenResponse,
    state: FlowState,
}

/// `POST /api/oauth2-client/start`
pub async fn start(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::POST) {
        return response;
    }

    let payload: StartPayload = match ex.decode_body() {
        Ok(payload) => payload,
        Err(e) => {
            return ex.respond_error(
                StatusCode::BAD_REQUEST,
                "error-decoding-payload",
                &format!("Error decoding payload: {}", e),
            )
        }
    };

    let mut authorize = match Url::parse(&payload.authorize_url) {
        Ok(url) => url,
        Err(e) => {
            return ex.respond_error(
                StatusCode::BAD_REQUEST,
                "error-parsing-authorizeUrl",
                &format!("Error parsing authorizeUrl: {}", e),
            )
        }
    };

    let flow = FlowState {
        state: payload.state,
        authorize_url: payload.authorize_url.clone(),
        token_url: Some(payload.token_url),
        client_id: payload.client_id.clone(),
        client_secret: payload.client_secret,
        redirect_uri: payload.redirect_uri.clone(),
    };
    let packed = match codec::encode(&flow) {
        Ok(packed) => packed,
        Err(e) => {
            return ex.respond_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error-encoding-state",
                &e.to_string(),
            )
        }
    };

    set_query_params(
        &mut authorize,
        &[
            ("response_type", "code"),
            ("client_id", payload.client_id.as_str()),
            ("redirect_uri", payload.redirect_uri.as_str()),
            ("scope", payload.scope.as_str()),
            ("state", packed.as_str()),
        ],
    );
    authorize.set_fragment(None);

    tracing::debug!(authorize_url = %payload.authorize_url, "Starting OAuth2 flow");
    ex.redirect(authorize.as_str())
}

/// `GET /api/oauth2-client/verify`
pub async fn verify(ex: Exchange) -> Response {
    if let Err(response) = ex.require_method(Method::GET) {
        return response;
    }

    let code = match ex.query_param_single("code") {
        Ok(code) => code,
        Err(e) => {
            return ex.respond_error(StatusCode::BAD_REQUEST, "missing-code", &e.to_string())
        }
    };
    let packed = match ex.query_param_single("state") {
        Ok(packed) => packed,
        Err(e) => {
            return ex.respond_error(StatusCode::BAD_REQUEST, "missing-state", &e.to_string())
        }
    };
    let flow: FlowState = match codec::decode(&packed) {
        Ok(flow) => flow,
        Err(e) => {
            return ex.respond_error(
                StatusCode::BAD_REQUEST,
                "invalid-state",
                &format!("Could not decode state: {}", e),
            )
        }
    };

    let token_response = match flow.token_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(token_url) => match exchange_code(&ex, token_url, &code, &flow).await {
            Ok(token_response) => token_response,
            Err(response) => return response,
        },
        None => TokenResponse::default(),
    };

    let authorize_response = ex
        .query_pairs()
        .into_iter()
        .filter(|(k, _)| k != "state")
        .collect();

    let result = FlowResult {
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        authorize_response,
        token_response,
        state: flow,
    };

    match codec::encode(&result) {
        Ok(packed) => ex.redirect(&format!("{}?{}", RESULT_PATH, packed)),
        Err(e) => {
            tracing::error!(error = %e, "Error encoding OAuth2 result");
            ex.respond_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error-encoding-result",
                &e.to_string(),
            )
        }
    }
}

/// Trade the authorization code at the token endpoint. `Err` is a ready
/// error response.
async fn exchange_code(
    ex: &Exchange,
    token_url: &str,
    code: &str,
    flow: &FlowState,
) -> Result<TokenResponse, Response> {
    let url = Url::parse(token_url).map_err(|e| {
        ex.respond_error(
            StatusCode::BAD_REQUEST,
            "invalid-token-url",
            &format!("Error parsing token URL: {}", e),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ex.respond_error(
            StatusCode::BAD_REQUEST,
            "invalid-token-url",
            "Token URL must be http or https",
        ));
    }

    let host = url.host_str().unwrap_or_default();
    if !ex.is_address_allowed_for_proxy(host) {
        return Err(ex.respond_error(
            StatusCode::BAD_REQUEST,
            "host-not-allowed",
            &format!("Host {:?} is not allowed", host),
        ));
    }

    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", code)
        .append_pair("redirect_uri", &flow.redirect_uri)
        .append_pair("client_id", &flow.client_id)
        .append_pair("client_secret", &flow.client_secret)
        .finish();

    let request = OutboundRequest::post(url)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        )
        .header(header::ACCEPT, HeaderValue::from_static(APPLICATION_JSON))
        .body(form);

    match ex.http_do(request).await {
        Ok(response) => Ok(token_response(&response)),
        Err(e) => {
            tracing::warn!(token_url = %token_url, error = %e, "Token request failed");
            Err(ex.respond_error(
                StatusCode::BAD_GATEWAY,
                "token-request-failed",
                &e.to_string(),
            ))
        }
    }
}

/// JSON bodies are embedded as JSON, anything else as text.
fn token_response(response: &OutboundResponse) -> TokenResponse {
    let content_type = response.content_type();
    let text = String::from_utf8_lossy(&response.body).into_owned();
    let body = if content_type == APPLICATION_JSON {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    } else {
        serde_json::Value::String(text)
    };
    TokenResponse { body, content_type }
}

/// Replace `params` in the query of `url`, keeping any other parameters.
fn set_query_params(url: &mut Url, params: &[(&str, &str)]) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|&(name, _)| name == k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    for (k, v) in &kept {
        query.append_pair(k, v);
    }
    for (k, v) in params {
        query.append_pair(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::testing::RecordingClient;
    use crate::http::exchange::testing::exchange;
    use std::sync::Arc;

    const START_BODY: &str = r#"{
        "authorizeUrl": "https://idp.example/authorize?prompt=consent&scope=old",
        "clientId": "cid",
        "clientSecret": "secret",
        "redirectUri": "http://localhost:3061/api/oauth2-client/verify",
        "scope": "read write",
        "tokenUrl": "https://idp.example/token",
        "state": "mine"
    }"#;

    fn client() -> Arc<RecordingClient> {
        Arc::new(RecordingClient::replying(
            StatusCode::OK,
            &[("content-type", "application/json; charset=utf-8")],
            r#"{"access_token":"tok","token_type":"bearer"}"#,
        ))
    }

    fn location(response: &Response) -> Url {
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        Url::parse("http://localhost:3061").unwrap().join(location).unwrap()
    }

    fn query_map(url: &Url) -> BTreeMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    fn packed_flow() -> String {
        codec::encode(&FlowState {
            state: "mine".into(),
            authorize_url: "https://idp.example/authorize".into(),
            token_url: Some("https://idp.example/token".into()),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3061/api/oauth2-client/verify".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_redirects_with_packed_state() {
        let ex = exchange(Method::POST, "/api/oauth2-client/start", START_BODY, &[], client());

        let response = start(ex).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let to = location(&response);
        assert_eq!(to.host_str(), Some("idp.example"));
        assert_eq!(to.path(), "/authorize");
        let query = query_map(&to);
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "cid");
        assert_eq!(query["scope"], "read write");
        assert_eq!(to.query_pairs().filter(|(k, _)| k == "scope").count(), 1);

        let flow: FlowState = codec::decode(&query["state"]).unwrap();
        assert_eq!(flow.state, "mine");
        assert_eq!(flow.token_url.as_deref(), Some("https://idp.example/token"));
        assert_eq!(flow.client_secret, "secret");
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_fields() {
        let body = r#"{"authorizeUrl":"https://a","clientId":"","clientSecret":"","redirectUri":"",
            "scope":"","tokenUrl":"","extra":1}"#;
        let ex = exchange(Method::POST, "/api/oauth2-client/start", body, &[], client());

        let response = start(ex).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_authorize_url() {
        let body = r#"{"authorizeUrl":"not a url","clientId":"","clientSecret":"","redirectUri":"",
            "scope":"","tokenUrl":""}"#;
        let ex = exchange(Method::POST, "/api/oauth2-client/start", body, &[], client());

        let response = start(ex).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("error-parsing-authorizeUrl"));
    }

    #[tokio::test]
    async fn test_verify_exchanges_code_and_redirects_to_result() {
        let client = client();
        let uri = format!("/api/oauth2-client/verify?code=abc&scope=read&state={}", packed_flow());
        let ex = exchange(Method::GET, &uri, "", &[], client.clone());

        let response = verify(ex).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let recorded = client.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, Method::POST);
        assert_eq!(recorded[0].url.as_str(), "https://idp.example/token");
        let form: BTreeMap<String, String> = url::form_urlencoded::parse(&recorded[0].body)
            .into_owned()
            .collect();
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "abc");
        assert_eq!(form["client_secret"], "secret");

        let to = location(&response);
        assert_eq!(to.path(), RESULT_PATH);
        let result: serde_json::Value = codec::decode(to.query().unwrap()).unwrap();
        assert_eq!(result["authorizeResponse"], serde_json::json!({"code": "abc", "scope": "read"}));
        assert_eq!(result["tokenResponse"]["contentType"], "application/json");
        assert_eq!(result["tokenResponse"]["body"]["access_token"], "tok");
        assert_eq!(result["state"]["state"], "mine");
        assert!(result["time"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_verify_missing_params() {
        let ex = exchange(Method::GET, "/api/oauth2-client/verify?state=x", "", &[], client());
        assert_eq!(verify(ex).await.status(), StatusCode::BAD_REQUEST);

        let ex = exchange(Method::GET, "/api/oauth2-client/verify?code=x", "", &[], client());
        assert_eq!(verify(ex).await.status(), StatusCode::BAD_REQUEST);

        let ex = exchange(Method::GET, "/api/oauth2-client/verify?code=x&state=%25%25", "", &[], client());
        assert_eq!(verify(ex).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_refuses_internal_token_url() {
        let client = client();
        let mut flow: FlowState = codec::decode(&packed_flow()).unwrap();
        flow.token_url = Some("http://169.254.169.254/latest/meta-data".into());
        let uri = format!(
            "/api/oauth2-client/verify?code=abc&state={}",
            codec::encode(&flow).unwrap()
        );
        let ex = exchange(Method::GET, &uri, "", &[], client.clone());

        let response = verify(ex).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(client.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_verify_token_failure_is_bad_gateway() {
        let uri = format!("/api/oauth2-client/verify?code=abc&state={}", packed_flow());
        let ex = exchange(Method::GET, &uri, "", &[], Arc::new(RecordingClient::failing()));
        assert_eq!(verify(ex).await.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_non_json_token_body_kept_as_text() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/x-www-form-urlencoded"));
        let response = OutboundResponse {
            status: StatusCode::OK,
            headers,
            body: "access_token=tok&token_type=bearer".into(),
        };
        let token = token_response(&response);
        assert_eq!(token.body, serde_json::json!("access_token=tok&token_type=bearer"));
        assert_eq!(token.content_type, "application/x-www-form-urlencoded");
    }
}
