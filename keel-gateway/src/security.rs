//! CORS policy and hardening response headers.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};

use crate::config::CorsConfig;

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self'; img-src 'self' data: https:";

/// Build the CORS layer for the configured origins.
///
/// Origins that are not valid header values are skipped.
#[must_use]
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config.origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(config.credentials)
}

/// Hardening headers added to every response unless a handler set them.
#[must_use]
pub fn security_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(CONTENT_SECURITY_POLICY)),
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
    ]
}

/// Wrap `router` with one header layer per [`security_headers`] entry.
pub fn with_security_headers(router: Router) -> Router {
    security_headers().into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(name, value))
    })
}
