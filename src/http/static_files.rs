//! Static asset fallback for unmatched GET requests.
//!
//! # Responsibilities
//! - Serve files from the configured frontend build directory
//! - Infer `Content-Type` from the file extension (best effort)
//! - Redirect directory paths to their trailing-slash form
//! - Fall back to `index.html` so client-side routes load the app
//!
//! # Design Decisions
//! - Paths with `..` segments never touch the filesystem
//! - Missing index is a 404, not a 500: nothing is broken server-side
//!   when no frontend has been deployed

use std::io;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::Response,
};

use crate::http::response;

const INDEX: &str = "index.html";

enum AssetError {
    NotFound,
    Directory,
    Io(io::Error),
}

/// Serve the asset named by the request path, or the SPA index.
pub async fn serve_static(root: Option<&Path>, parts: &Parts) -> Response {
    let Some(root) = root else {
        return response::error(StatusCode::NOT_FOUND, "not-found", "Not found.");
    };

    let raw = parts.uri.path().trim_start_matches('/');
    let Ok(decoded) = urlencoding::decode(raw) else {
        return serve_index(root).await;
    };
    if decoded.is_empty() {
        return serve_index(root).await;
    }
    let Some(relative) = safe_relative(&decoded) else {
        tracing::debug!(path = %parts.uri.path(), "Rejected asset path");
        return serve_index(root).await;
    };

    let target = if decoded.ends_with('/') {
        root.join(&relative).join(INDEX)
    } else {
        root.join(&relative)
    };

    match read_asset(&target).await {
        Ok(response) => response,
        Err(AssetError::Directory) => {
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            redirect_permanent(&format!("./{}/", name))
        }
        Err(AssetError::NotFound) => serve_index(root).await,
        Err(AssetError::Io(e)) => {
            tracing::error!(path = %target.display(), error = %e, "Error responding to static file");
            response::error(StatusCode::NOT_FOUND, "not-found", "Not found.")
        }
    }
}

async fn serve_index(root: &Path) -> Response {
    match read_asset(&root.join(INDEX)).await {
        Ok(response) => response,
        Err(AssetError::Io(e)) => {
            tracing::error!(root = %root.display(), error = %e, "Error reading index document");
            response::error(StatusCode::NOT_FOUND, "index-on-404-fail", "Not found")
        }
        Err(_) => response::error(StatusCode::NOT_FOUND, "index-on-404-fail", "Not found"),
    }
}

async fn read_asset(path: &Path) -> Result<Response, AssetError> {
    let metadata = tokio::fs::metadata(path).await.map_err(classify)?;
    if metadata.is_dir() {
        return Err(AssetError::Directory);
    }

    let content = tokio::fs::read(path).await.map_err(classify)?;

    let mut response = Response::new(Body::from(content));
    if let Some(content_type) = content_type_for(path) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    Ok(response)
}

fn classify(e: io::Error) -> AssetError {
    match e.kind() {
        io::ErrorKind::NotFound => AssetError::NotFound,
        _ => AssetError::Io(e),
    }
}

/// Turn a decoded URL path into a relative filesystem path, refusing
/// anything that could escape the root.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') || s.contains(':') => return None,
            s => out.push(s),
        }
    }
    Some(out)
}

fn redirect_permanent(to: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::PERMANENT_REDIRECT;
    match HeaderValue::from_str(to) {
        Ok(location) => {
            response.headers_mut().insert(header::LOCATION, location);
            response
        }
        Err(_) => response::error(StatusCode::NOT_FOUND, "not-found", "Not found."),
    }
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/vnd.microsoft.icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(content_type)
}
