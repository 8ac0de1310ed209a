//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, client
//! resolution, route dispatch and access logging.

use crate::config::AppState;
use crate::handler::{files, list};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Route serving the bucket listing
pub const LIST_PATH: &str = "/list";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Percent-decoded request path
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
    /// Resolved client address
    pub client: String,
}

/// Main entry point for HTTP request handling.
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let raw_path = req.uri().path().to_string();
    let client = client_address(req.headers(), peer_addr);

    logger::log_request(&client, &raw_path);

    let response = match percent_decode_str(&raw_path).decode_utf8() {
        Ok(path) => {
            let ctx = RequestContext {
                path: &path,
                is_head: method == Method::HEAD,
                if_none_match: header_string(req.headers(), "if-none-match"),
                range_header: header_string(req.headers(), "range"),
                client: client.clone(),
            };
            route_request(&method, &ctx, &state).await
        }
        Err(_) => {
            logger::log_warning(&format!("Request path is not valid UTF-8: {raw_path}"));
            http::build_404_response()
        }
    };

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(client, method.to_string(), raw_path);
        entry.http_version = version_label(req.version()).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.user_agent = header_string(req.headers(), USER_AGENT.as_str());
        entry.elapsed = started.elapsed();
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Dispatch to the list or download handler
async fn route_request(
    method: &Method,
    ctx: &RequestContext<'_>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    if let Some(resp) = check_http_method(method) {
        return resp;
    }

    if ctx.path == LIST_PATH {
        return list::list_objects(ctx, state).await;
    }

    if ctx.path.starts_with(&state.download_prefix) {
        return files::serve_object(ctx, state).await;
    }

    http::build_404_response()
}

/// Only GET and HEAD are served
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Client address for logging.
///
/// Prefers `X-Real-Ip`, then the first `X-Forwarded-For` hop, then the peer address.
pub fn client_address(headers: &HeaderMap, peer_addr: SocketAddr) -> String {
    header_string(headers, "x-real-ip")
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            header_string(headers, "x-forwarded-for").and_then(|chain| {
                chain
                    .split(',')
                    .map(str::trim)
                    .find(|hop| !hop.is_empty())
                    .map(ToString::to_string)
            })
        })
        .unwrap_or_else(|| peer_addr.to_string())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
