//! Per-request context handed to handlers.
//!
//! # Responsibilities
//! - Bundle the inbound request, extracted path fields, shared settings and
//!   the outbound HTTP client
//! - JSON decode/encode helpers and structured error responses
//! - Single-valued query parameter extraction
//! - Expose the outbound address policy check
//!
//! # Design Decisions
//! - Created fresh for each request and moved into the handler; nothing in
//!   it outlives the request
//! - Settings and client are shared `Arc`s, read-only
//! - Handlers return their whole `Response`; the router never rewrites it

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::config::Settings;
use crate::http::client::{HttpClient, OutboundError, OutboundRequest, OutboundResponse};
use crate::http::response;
use crate::routing::Fields;

/// Boxed future returned by every handler.
pub type HandlerFuture = BoxFuture<'static, Response>;

/// A route handler. Stored in the route table, shared across requests.
pub type Handler = Arc<dyn Fn(Exchange) -> HandlerFuture + Send + Sync>;

/// Wrap an async function as a `Handler`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ex| -> HandlerFuture { Box::pin(f(ex)) })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryParamError {
    #[error("missing required param {0:?}")]
    Missing(String),

    #[error("too many values for param {0:?}, expected only one")]
    TooMany(String),
}

#[derive(Debug, Error)]
#[error("invalid JSON body: {0}")]
pub struct BodyError(#[from] serde_json::Error);

pub struct Exchange {
    parts: Parts,
    body: Bytes,
    fields: Fields,
    settings: Arc<Settings>,
    client: Arc<dyn HttpClient>,
}

impl Exchange {
    pub fn new(
        parts: Parts,
        body: Bytes,
        fields: Fields,
        settings: Arc<Settings>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            parts,
            body,
            fields,
            settings,
            client,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Value captured by the named group `name` of the matched route.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decode the JSON body. Payload types that must reject unknown fields
    /// carry `#[serde(deny_unknown_fields)]`.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn respond<T: Serialize + ?Sized>(&self, status: StatusCode, data: &T) -> Response {
        response::json(status, data)
    }

    pub fn respond_error(&self, status: StatusCode, code: &str, message: &str) -> Response {
        response::error(status, code, message)
    }

    /// `{"error": "<err>"}`. Kept for older call sites.
    pub fn respond_error_legacy(&self, status: StatusCode, err: impl fmt::Display) -> Response {
        response::legacy_error(status, &err.to_string())
    }

    /// `Err` carries a ready 405 response when the method does not match.
    pub fn require_method(&self, method: Method) -> Result<(), Response> {
        if self.parts.method == method {
            Ok(())
        } else {
            Err(self.respond_error_legacy(
                StatusCode::METHOD_NOT_ALLOWED,
                format_args!("Invalid method {}", self.parts.method),
            ))
        }
    }

    /// Decoded query string pairs, in order, repeats preserved.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let query = self.parts.uri.query().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// The one and only value of query parameter `name`.
    pub fn query_param_single(&self, name: &str) -> Result<String, QueryParamError> {
        let mut values = self
            .query_pairs()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v);

        match (values.next(), values.next()) {
            (None, _) => Err(QueryParamError::Missing(name.to_string())),
            (Some(value), None) => Ok(value),
            (Some(_), Some(_)) => Err(QueryParamError::TooMany(name.to_string())),
        }
    }

    pub fn redirect(&self, to: &str) -> Response {
        response::redirect(to)
    }

    /// Perform an outbound call. Callers acting for a remote client must
    /// check `is_address_allowed_for_proxy` first.
    pub async fn http_do(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        self.client.execute(request).await
    }

    pub fn is_address_allowed_for_proxy(&self, address: &str) -> bool {
        let decision = self.settings.address_policy().evaluate(address);
        if !decision.is_permitted() {
            tracing::warn!(address = %address, decision = ?decision, "Proxy target denied");
        }
        decision.is_permitted()
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
