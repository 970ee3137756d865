//! Request metadata capture for fault logging and client keying.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, OriginalUri, Request},
    http::header::USER_AGENT,
};
use keel_core::RequestContext;

/// Best-effort client address.
///
/// With `trust_proxy`, the first `X-Forwarded-For` entry, then `X-Real-IP`;
/// otherwise those client-controlled headers are ignored. Falls back to the
/// socket peer, else `"unknown"`.
#[must_use]
pub fn client_ip(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = forwarded_ip(request) {
            return forwarded;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_ip(request: &Request) -> Option<String> {
    let headers = request.headers();

    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    first_forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_owned)
}

/// Snapshot the request's metadata.
#[must_use]
pub fn capture(request: &Request, trust_proxy: bool) -> RequestContext {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri(), |OriginalUri(uri)| uri);
    let url = uri.path_and_query().map_or_else(|| uri.path().to_owned(), ToString::to_string);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    RequestContext::new(request.method().as_str(), url, client_ip(request, trust_proxy))
        .with_user_agent(user_agent)
}
