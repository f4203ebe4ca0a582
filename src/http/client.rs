//! Outbound HTTP capability handed to handlers.
//!
//! # Responsibilities
//! - Define the single `execute` operation handlers use for outbound calls
//! - Provide the production implementation on top of reqwest
//!
//! # Design Decisions
//! - Trait object so tests can inject a recording client
//! - Redirects are never followed: a permitted host could otherwise bounce
//!   the request to a target the address policy would have refused
//! - Futures are cancel-safe: dropping one (request deadline) aborts the call
//! - No retries; failures surface to the handler

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundResponse {
    /// All values of `name` that are valid strings.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Media type of the response, without parameters.
    pub fn content_type(&self) -> String {
        self.header_values("content-type")
            .first()
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("outbound request timed out")]
    Timeout,

    #[error("outbound request failed: {0}")]
    Transport(String),

    #[error("outbound client could not be built: {0}")]
    Build(String),
}

/// The outbound HTTP capability.
pub trait HttpClient: Send + Sync {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, OutboundError>>;
}

/// Production client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, OutboundError> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(concat!("littletools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OutboundError::Build(e.to_string()))?;

        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, OutboundError>> {
        Box::pin(async move {
            tracing::debug!(method = %request.method, url = %request.url, "Outbound request");

            let response = self
                .inner
                .request(request.method, request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(map_reqwest_error)?;

            Ok(OutboundResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> OutboundError {
    if e.is_timeout() {
        OutboundError::Timeout
    } else {
        OutboundError::Transport(e.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A client that records requests and replays canned responses.

    use super::*;
    use std::sync::Mutex;

    pub struct RecordingClient {
        pub requests: Mutex<Vec<OutboundRequest>>,
        response: Mutex<Option<Result<OutboundResponse, OutboundError>>>,
    }

    impl RecordingClient {
        pub fn replying(status: StatusCode, headers: &[(&'static str, &'static str)], body: &'static str) -> Self {
            let mut map = HeaderMap::new();
            for &(name, value) in headers {
                map.append(name, HeaderValue::from_static(value));
            }
            Self {
                requests: Mutex::new(Vec::new()),
                response: Mutex::new(Some(Ok(OutboundResponse {
                    status,
                    headers: map,
                    body: Bytes::from_static(body.as_bytes()),
                }))),
            }
        }

        pub fn failing() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Mutex::new(Some(Err(OutboundError::Transport("connection refused".into())))),
            }
        }

        pub fn recorded(&self) -> Vec<OutboundRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpClient for RecordingClient {
        fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, Result<OutboundResponse, OutboundError>> {
            self.requests.lock().unwrap().push(request);
            let response = self
                .response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(OutboundError::Transport("no canned response left".into())));
            Box::pin(async move { response })
        }
    }
}
