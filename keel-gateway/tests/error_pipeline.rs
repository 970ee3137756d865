//! Integration test: the full router's fault pipeline.
//!
//! Drives the real router through `oneshot` and checks the envelope contract:
//! status codes, messages, development-only diagnostics and per-request
//! isolation of not-found envelopes.

use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use futures::future::join_all;
use keel_gateway::{config::GatewayConfig, routes::create_router};
use serde_json::Value;
use tower::ServiceExt;

fn router_with(configure: impl FnOnce(&mut GatewayConfig)) -> Router {
    let mut config = GatewayConfig::default();
    config.features.logging = false;
    configure(&mut config);
    create_router(Arc::new(config)).unwrap_or_else(|e| panic!("router must build: {e}"))
}

fn production() -> Router {
    router_with(|c| c.server.environment_name = "production".to_owned())
}

fn development() -> Router {
    router_with(|c| c.server.environment_name = "development".to_owned())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("failed to build request: {e}"))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap_or_else(|e| panic!("failed to build request: {e}"))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.oneshot(req).await.unwrap_or_else(|e| panic!("handler error: {e}"));
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap_or_else(|e| panic!("failed to read body: {e}"));
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("invalid JSON: {e}"));
    (status, headers, body)
}

const VALID_FORM: &str = r#"{"name":"Ada","email":"ada@example.com","password":"Passw0rd","confirmPassword":"Passw0rd"}"#;

#[tokio::test]
async fn unmatched_route_returns_404_envelope_with_path() {
    let (status, _, body) = send(production(), get("/does/not/exist?x=1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["statusCode"], 404);
    assert_eq!(body["error"]["message"], "Route /does/not/exist?x=1 not found");
    assert!(body["error"].get("stack").is_none(), "production must not expose stack");
}

#[tokio::test]
async fn unmatched_nested_route_keeps_full_path() {
    let (status, _, body) = send(production(), get("/api/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Route /api/missing not found");
}

#[tokio::test]
async fn wrong_method_on_known_route_is_not_found() {
    let (status, _, body) = send(production(), post_json("/health", "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Route /health not found");
}

#[tokio::test]
async fn development_envelope_carries_stack_and_details() {
    let req = Request::builder()
        .uri("/nowhere")
        .header(header::USER_AGENT, "pipeline-test")
        .header("x-forwarded-for", "203.0.113.5")
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("failed to build request: {e}"));
    let app = router_with(|c| {
        c.server.environment_name = "development".to_owned();
        c.server.trust_proxy = true;
    });
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stack = body["error"]["stack"].as_str().unwrap_or_default();
    assert!(stack.starts_with("NotFoundFault: Route /nowhere not found"), "unexpected stack: {stack}");

    let details = &body["error"]["details"];
    assert_eq!(details["url"], "/nowhere");
    assert_eq!(details["method"], "GET");
    assert_eq!(details["ip"], "203.0.113.5");
    assert_eq!(details["userAgent"], "pipeline-test");
    assert_eq!(details["statusCode"], 404);
    assert!(details["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
}

#[tokio::test]
async fn malformed_json_is_400_invalid_json() {
    let (status, _, body) =
        send(production(), post_json("/api/validate/registration", "{\"name\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid JSON");
    assert_eq!(body["error"]["statusCode"], 400);
}

#[tokio::test]
async fn malformed_json_in_development_logs_parser_detail() {
    let (_, _, body) = send(development(), post_json("/api/validate/registration", r#"{"email": "ada@example.com","#)).await;
    assert_eq!(body["error"]["message"], "Invalid JSON");
    let raw = body["error"]["details"]["message"].as_str().unwrap_or_default();
    assert_ne!(raw, "Invalid JSON", "details keep the parser's own message");
}

#[tokio::test]
async fn wrong_shape_json_is_validation_fault() {
    let (status, _, body) =
        send(production(), post_json("/api/validate/registration", r#"{"name":"Ada"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(body["error"]["message"], "Invalid JSON");
}

#[tokio::test]
async fn validation_failures_are_listed() {
    let form = r#"{"name":"Ada","email":"bad","password":"Passw0rd","confirmPassword":"Passw0rd"}"#;
    let (status, _, body) = send(production(), post_json("/api/validate/registration", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Validation failed: Please provide a valid email address");
}

#[tokio::test]
async fn valid_registration_succeeds() {
    let (status, _, body) =
        send(production(), post_json("/api/validate/registration", VALID_FORM)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "ada@example.com");
}

#[tokio::test]
async fn oversized_body_is_413() {
    let padding = "a".repeat(keel_gateway::routes::BODY_LIMIT_BYTES + 1);
    let form = format!(r#"{{"name":"{padding}"}}"#);
    let (status, _, body) = send(production(), post_json("/api/validate/registration", &form)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["message"], "Payload too large");
}

#[tokio::test]
async fn rate_limit_exceeded_returns_429_with_retry_after() {
    let app = router_with(|c| {
        c.server.environment_name = "production".to_owned();
        c.security.rate_limit.max_requests = NonZeroU32::MIN;
    });

    let (first, _, _) = send(app.clone(), get("/api/health")).await;
    assert_eq!(first, StatusCode::OK);

    let (status, headers, body) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["message"], "Too many requests");
    assert_eq!(body["error"]["statusCode"], 429);
    assert!(headers.contains_key(header::RETRY_AFTER));
}

fn from_peer_forwarded_as(uri: &str, forwarded_for: &str) -> Request<Body> {
    let mut req = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", forwarded_for)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("failed to build request: {e}"));
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 20], 5000))));
    req
}

#[tokio::test]
async fn rate_limit_keys_on_peer_when_forwarding_headers_rotate() {
    let app = router_with(|c| c.security.rate_limit.max_requests = NonZeroU32::MIN);

    let mut passed = 0;
    for i in 0..20 {
        let req = from_peer_forwarded_as("/api/health", &format!("203.0.113.{i}"));
        let (status, _, _) = send(app.clone(), req).await;
        if status == StatusCode::OK {
            passed += 1;
        } else {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(passed, 1, "one socket gets one request regardless of X-Forwarded-For");
}

#[tokio::test]
async fn rate_limit_trusts_forwarding_headers_behind_proxy() {
    let app = router_with(|c| {
        c.security.rate_limit.max_requests = NonZeroU32::MIN;
        c.server.trust_proxy = true;
    });

    for i in 0..5 {
        let req = from_peer_forwarded_as("/api/health", &format!("203.0.113.{i}"));
        let (status, _, _) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK, "each forwarded client has its own budget");
    }
    let (status, _, _) = send(app, from_peer_forwarded_as("/api/health", "203.0.113.0")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rate_limit_does_not_apply_outside_api() {
    let app = router_with(|c| c.security.rate_limit.max_requests = NonZeroU32::MIN);
    for _ in 0..3 {
        let (status, _, _) = send(app.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn health_routes_always_succeed() {
    for uri in ["/health", "/api/health", "/health?verbose=1"] {
        let (status, _, body) = send(production(), get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["success"], true, "{uri}");
        assert_eq!(body["status"], "OK", "{uri}");
        assert_eq!(body["environment"], "production", "{uri}");
        assert!(body["uptime"].is_number(), "{uri}");
    }
}

#[tokio::test]
async fn error_responses_keep_security_headers() {
    let (_, headers, _) = send(production(), get("/missing")).await;
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
}

#[tokio::test]
async fn concurrent_unmatched_routes_get_their_own_envelope() {
    let app = production();
    let requests = (0..32).map(|i| {
        let app = app.clone();
        async move {
            let path = format!("/missing/{i}");
            let (status, _, body) = send(app, get(&path)).await;
            (path, status, body)
        }
    });

    for (path, status, body) in join_all(requests).await {
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], format!("Route {path} not found"));
    }
}
