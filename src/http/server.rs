//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the Axum router: one fallback service that owns all dispatch
//! - Wire up middleware (request ID, tracing)
//! - Reject malformed requests before any handler runs
//! - Match the path against the route table and invoke the handler under
//!   the request deadline
//! - Hand unmatched GETs to the static asset fallback
//! - Serve on a TCP or Unix listener until shutdown
//!
//! # Data Flow
//! ```text
//! request
//!     → `*` target?            → 400 (+ Connection: close)
//!     → host allowlist         → 400 "Host not allowed."
//!     → content type (non-GET) → 400 "Bad Request"
//!     → route table match
//!         hit:  (buffer body → Exchange → handler) under deadline
//!         miss: GET → static_files (deadline), else 404 not-found
//! ```
//!
//! # Design Decisions
//! - Axum's own routing is not used; patterns are regexes, first match wins
//! - Handlers produce the whole response; dispatch never rewrites it
//! - On deadline the handler future is dropped, so it can never write late

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    BoxError,
    http::{header, request::Parts, HeaderValue, Method, Request, StatusCode, Version},
    response::Response,
    Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::http::client::HttpClient;
use crate::http::exchange::{Exchange, Handler};
use crate::http::{response, static_files};
use crate::lifecycle::signals::wait_for_shutdown;
use crate::net::Listener;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::content_type;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable<Handler>>,
    pub settings: Arc<Settings>,
    pub client: Arc<dyn HttpClient>,
}

/// HTTP server for the tool endpoints and static assets.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(settings: Arc<Settings>, routes: RouteTable<Handler>, client: Arc<dyn HttpClient>) -> Self {
        let state = AppState {
            routes: Arc::new(routes),
            settings,
            client,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a signal or `shutdown` fires.
    pub async fn run(self, listener: Listener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        match listener {
            Listener::Tcp(listener) => {
                tracing::info!(address = %listener.local_addr()?, "HTTP server starting");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(wait_for_shutdown(shutdown))
                    .await?;
            }
            #[cfg(unix)]
            Listener::Unix { listener, path } => {
                tracing::info!(socket = %path.display(), "HTTP server starting");
                let served = axum::serve(listener, self.router)
                    .with_graceful_shutdown(wait_for_shutdown(shutdown))
                    .await;
                crate::net::listener::remove_socket(&path);
                served?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request lands here.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let (response, outcome) = handle(&state, request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), outcome, start);
    response
}

async fn handle(state: &AppState, request: Request<Body>) -> (Response, &'static str) {
    let (parts, body) = request.into_parts();

    if parts.uri.path() == "*" {
        return (wildcard_rejection(parts.version), "rejected");
    }

    if let Err(host) = state.settings.allowed_hosts().check(&parts) {
        tracing::warn!(host = %host, "Host not allowed");
        return (
            response::plain(StatusCode::BAD_REQUEST, "Host not allowed."),
            "rejected",
        );
    }

    if !content_type::is_acceptable(&parts.method, &parts.headers) {
        tracing::debug!(
            method = %parts.method,
            content_type = ?content_type::media_type(&parts.headers),
            "Unsupported content type"
        );
        return (response::plain(StatusCode::BAD_REQUEST, "Bad Request"), "rejected");
    }

    let Some(matched) = state.routes.match_path(parts.uri.path()) else {
        if parts.method == Method::GET {
            let serve = async { (serve_static(state, &parts).await, "static") };
            return with_deadline(state, serve).await;
        }
        return (
            response::error(StatusCode::NOT_FOUND, "not-found", "Not found."),
            "not_found",
        );
    };

    let handler = Arc::clone(matched.route.handler());
    let fields = matched.fields;
    tracing::debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        pattern = %matched.route.pattern().as_str(),
        "Route matched"
    );

    let settings = Arc::clone(&state.settings);
    let client = Arc::clone(&state.client);
    let limit = state.settings.max_body_size();
    // The body read shares the deadline, so a stalled upload cannot pin the request.
    let work = async move {
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return (body_rejection(e), "rejected"),
        };
        let exchange = Exchange::new(parts, body, fields, settings, client);
        (handler(exchange).await, "handled")
    };
    with_deadline(state, work).await
}

fn body_rejection(error: BoxError) -> Response {
    if error.is::<LengthLimitError>() {
        tracing::warn!(error = %error, "Request body too large");
        response::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "body-too-large",
            "Request body too large.",
        )
    } else {
        tracing::warn!(error = %error, "Request body unreadable");
        response::error(
            StatusCode::BAD_REQUEST,
            "body-unreadable",
            "Request body could not be read.",
        )
    }
}

async fn serve_static(state: &AppState, parts: &Parts) -> Response {
    static_files::serve_static(state.settings.static_root(), parts).await
}

async fn with_deadline<F>(state: &AppState, work: F) -> (Response, &'static str)
where
    F: std::future::Future<Output = (Response, &'static str)>,
{
    let deadline = state.settings.request_timeout();
    match tokio::time::timeout(deadline, work).await {
        Ok(done) => done,
        Err(_) => {
            tracing::warn!(timeout = ?deadline, "Request deadline exceeded");
            (
                response::error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "timeout",
                    "Request took too long to process.",
                ),
                "timeout",
            )
        }
    }
}

fn wildcard_rejection(version: Version) -> Response {
    let mut response = response::plain(StatusCode::BAD_REQUEST, "Bad Request");
    // Connection-specific headers are illegal in HTTP/2 and later.
    if version == Version::HTTP_11 {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::http::client::testing::RecordingClient;
    use crate::http::exchange::handler;
    use axum::body::Bytes;
    use axum::response::IntoResponse;
    use std::time::Duration;
    use tower::ServiceExt;

    fn settings(config: AppConfig) -> Arc<Settings> {
        Arc::new(Settings::new(config))
    }

    fn server(config: AppConfig, routes: RouteTable<Handler>) -> Router {
        let client = Arc::new(RecordingClient::replying(StatusCode::OK, &[], ""));
        HttpServer::new(settings(config), routes, client).router()
    }

    fn tagged(tag: &'static str) -> Handler {
        handler(move |ex: Exchange| async move {
            let body = format!("{}:{}", tag, ex.field("id").unwrap_or("-"));
            (StatusCode::OK, body).into_response()
        })
    }

    fn routes() -> RouteTable<Handler> {
        let mut routes = RouteTable::new();
        routes
            .register("/items/(?P<id>[0-9]+)", tagged("item"))
            .unwrap()
            .register("/items/.*", tagged("catchall"))
            .unwrap()
            .register("/echo", handler(|ex: Exchange| async move {
                (StatusCode::OK, ex.body().clone()).into_response()
            }))
            .unwrap();
        routes
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::get(path)
            .header(header::HOST, "localhost:3061")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_match_wins_and_fields_extracted() {
        let app = server(AppConfig::default(), routes());

        let response = app.clone().oneshot(get("/items/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "item:42");

        let response = app.oneshot(get("/items/abc")).await.unwrap();
        assert_eq!(text(response).await, "catchall:-");
    }

    #[tokio::test]
    async fn test_disallowed_host_never_reaches_handler() {
        let app = server(AppConfig::default(), routes());
        let request = Request::get("/items/42")
            .header(header::HOST, "evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "Host not allowed.");
    }

    #[tokio::test]
    async fn test_forwarded_host_takes_precedence() {
        let app = server(AppConfig::default(), routes());
        let request = Request::get("/items/1")
            .header(header::HOST, "localhost")
            .header("x-forwarded-host", "evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_requires_json_content_type() {
        let app = server(AppConfig::default(), routes());

        let request = Request::post("/echo")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hi"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(response).await, "Bad Request");

        let request = Request::post("/echo")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "{}");
    }

    #[tokio::test]
    async fn test_wildcard_target_closes_connection() {
        let app = server(AppConfig::default(), routes());
        let request = Request::options("*")
            .header(header::HOST, "localhost")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }

    #[tokio::test]
    async fn test_unmatched_post_is_structured_404() {
        let app = server(AppConfig::default(), routes());
        let request = Request::post("/nowhere")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": {"code": "not-found", "message": "Not found."}})
        );
    }

    #[tokio::test]
    async fn test_unmatched_get_goes_to_static_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "spa").unwrap();
        let mut config = AppConfig::default();
        config.static_files.root = Some(dir.path().to_string_lossy().into_owned());

        let app = server(config, routes());
        let response = app.oneshot(get("/client/side/route")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "spa");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = AppConfig::default();
        config.security.max_body_size = 8;
        let app = server(config, routes());

        let request = Request::post("/echo")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"much":"too long"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_slow_handler_hits_deadline() {
        let mut config = AppConfig::default();
        config.timeouts.request_secs = 1;
        let mut routes = RouteTable::new();
        routes
            .register("/slow", handler(|_ex: Exchange| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                (StatusCode::OK, "late").into_response()
            }))
            .unwrap();

        let app = server(config, routes);
        let response = app.oneshot(get("/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(text(response).await.contains("\"timeout\""));
    }

    #[tokio::test]
    async fn test_stalled_body_hits_deadline() {
        let mut config = AppConfig::default();
        config.timeouts.request_secs = 1;
        let app = server(config, routes());

        let stalled = futures_util::stream::pending::<Result<Bytes, std::io::Error>>();
        let request = Request::post("/echo")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(stalled))
            .unwrap();

        let response = tokio::time::timeout(Duration::from_secs(5), app.oneshot(request))
            .await
            .expect("deadline should cut off the body read")
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_broken_body_is_bad_request() {
        let app = server(AppConfig::default(), routes());

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let request = Request::post("/echo")
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(text(response).await.contains("body-unreadable"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = server(AppConfig::default(), routes());
        let response = app.oneshot(get("/items/1")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
