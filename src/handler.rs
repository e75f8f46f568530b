//! Request handling for the demo file server.
//!
//! Maps an incoming hyper request to a library [`Response`] and writes that
//! response back to the wire. This is the upstream transport collaborator:
//! it supplies the method and raw Range header to the range constructor and
//! treats an absent body (HEAD) as headers-only.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use hyper::{Method, Request, StatusCode};
use serde::Serialize;

use respond::Response;

use crate::config::Config;
use crate::logger;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

/// Main entry point for HTTP request handling.
pub async fn handle_request(
    req: Request<Incoming>,
    config: Arc<Config>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let range_header = req
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if config.logging.access_log {
        logger::log_request(&method, &path);
    }

    let resp = route(&method, &path, range_header.as_deref(), &config).await;
    let is_head = method == Method::HEAD;
    Ok(to_wire(resp, is_head, config.logging.access_log).await)
}

async fn route(
    method: &Method,
    path: &str,
    range_header: Option<&str>,
    config: &Config,
) -> Response {
    if *method != Method::GET && *method != Method::HEAD {
        logger::log_warning(&format!("Method not allowed: {method}"));
        return method_not_allowed();
    }

    if path == "/health" {
        return health_response();
    }

    serve_file(method, path, range_header, config).await
}

async fn serve_file(
    method: &Method,
    path: &str,
    range_header: Option<&str>,
    config: &Config,
) -> Response {
    let Some(file_path) = resolve_path(&config.files.root, path) else {
        return not_found();
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&file_path)),
    );
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    // A Range request goes through the resolver; everything else is served
    // whole.
    if range_header.is_some() {
        return Response::file_range(&file_path, headers, method, range_header).await;
    }

    match tokio::fs::read(&file_path).await {
        Ok(content) => {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(content.len()));
            let body = if *method == Method::HEAD {
                Vec::new()
            } else {
                content
            };
            Response::from_bytes(StatusCode::OK, body, headers)
        }
        Err(_) => not_found(),
    }
}

/// Map a request path onto the served directory, rejecting traversal.
fn resolve_path(root: &str, request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.split('/').any(|segment| segment == "..") {
        logger::log_warning(&format!("Path traversal attempt blocked: {request_path}"));
        return None;
    }

    let mut path = PathBuf::from(root);
    if trimmed.is_empty() {
        path.push("index.html");
    } else {
        path.push(trimmed);
    }
    Some(path)
}

/// Content type from the file extension.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn health_response() -> Response {
    Response::json(StatusCode::OK, Some(&Health { status: "ok" }), HeaderMap::new())
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build health response: {e}"));
            Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

fn method_not_allowed() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Response::text(
        StatusCode::METHOD_NOT_ALLOWED,
        "405 Method Not Allowed",
        headers,
    )
}

fn not_found() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Response::text(StatusCode::NOT_FOUND, "404 Not Found", headers)
}

/// Drain a library response onto the wire. An absent body (HEAD) means
/// headers only.
async fn to_wire(
    resp: Response,
    is_head: bool,
    access_log: bool,
) -> hyper::Response<Full<Bytes>> {
    let status = resp.status();
    let headers = resp.headers().clone();

    let body = if is_head {
        Bytes::new()
    } else {
        match resp.bytes().collect().await {
            Ok(bytes) => bytes,
            Err(e) => {
                logger::log_error(&format!("Failed to drain response body: {e}"));
                let mut wire = hyper::Response::new(Full::new(Bytes::new()));
                *wire.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return wire;
            }
        }
    };

    if access_log {
        logger::log_response(status, body.len());
    }

    let mut wire = hyper::Response::new(Full::new(body));
    *wire.status_mut() = status;
    *wire.headers_mut() = headers;
    wire
}
