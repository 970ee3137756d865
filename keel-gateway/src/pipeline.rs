//! The fault boundary: classify, log and render every fault exactly once.

use std::{any::Any, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{
        header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use keel_core::{classify, Environment, ErrorDetails, ErrorEnvelope, Fault, FaultKind, RequestContext};

use crate::{config::GatewayConfig, error::ApiFault, request_context};

/// Outermost middleware. Lets successful responses through untouched and
/// replaces any response carrying a parked [`Fault`] with the final envelope.
///
/// Headers set by inner layers (CORS, security) are kept; body-related
/// headers are dropped along with the parked body.
pub async fn error_pipeline(
    State(config): State<Arc<GatewayConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let context = request_context::capture(&request, config.server.trust_proxy);
    let (mut parts, body) = next.run(request).await.into_parts();

    let Some(fault) = parts.extensions.remove::<Fault>() else {
        return Response::from_parts(parts, body);
    };

    let mut response = render(&fault, &context, config.server.environment(), Utc::now());
    for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_ENCODING] {
        parts.headers.remove(name);
    }
    response.headers_mut().extend(parts.headers);
    response
}

/// Classify `fault`, log it once and build its response.
#[must_use]
pub fn render(
    fault: &Fault,
    context: &RequestContext,
    environment: Environment,
    at: DateTime<Utc>,
) -> Response {
    let resolution = classify(fault);
    let details = ErrorDetails::new(fault, &resolution, context, at);
    log_fault(&details, resolution.operational);

    let status =
        StatusCode::from_u16(resolution.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response =
        (status, Json(ErrorEnvelope::build(&resolution, details, environment))).into_response();

    if let FaultKind::RateLimited { retry_after_secs: Some(secs) } = fault.kind() {
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

fn log_fault(details: &ErrorDetails, operational: bool) {
    let user_agent = details.user_agent.as_deref().unwrap_or("-");
    if operational {
        tracing::warn!(
            fault = %details.message,
            status_code = details.status_code,
            method = %details.method,
            url = %details.url,
            ip = %details.ip,
            user_agent,
            received_at = %details.received_at,
            timestamp = %details.timestamp,
            stack = %details.stack,
            "operational error"
        );
    } else {
        tracing::error!(
            fault = %details.message,
            status_code = details.status_code,
            method = %details.method,
            url = %details.url,
            ip = %details.ip,
            user_agent,
            received_at = %details.received_at,
            timestamp = %details.timestamp,
            stack = %details.stack,
            "non-operational error"
        );
    }
}

/// Turn a handler panic into an unclassified fault so it flows through the
/// pipeline like any other.
#[must_use]
pub fn panic_fault(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    };
    ApiFault(Fault::unclassified(format!("panic: {detail}"))).into_response()
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Mutex, PoisonError},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
        }
    }

    /// Render `fault` under a scoped subscriber and return what it logged.
    fn logged_while_rendering(fault: &Fault) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let context = RequestContext::new("POST", "/api/x", "unknown");
        tracing::subscriber::with_default(subscriber, || {
            let _ = render(fault, &context, Environment::Production, Utc::now());
        });
        log.text()
    }

    #[test]
    fn log_fault_operational_goes_to_warn() {
        let out = logged_while_rendering(&Fault::validation("name is required"));
        assert!(out.contains("WARN"), "expected a WARN record, got: {out}");
        assert!(!out.contains("ERROR"), "operational faults must not log at ERROR: {out}");
        assert!(out.contains("status_code=400"));
    }

    #[test]
    fn log_fault_malformed_input_goes_to_error() {
        let out = logged_while_rendering(&Fault::malformed_input("expected value"));
        assert!(out.contains("ERROR"), "expected an ERROR record, got: {out}");
        assert!(out.contains("non-operational error"));
        assert!(!out.contains("WARN"));
    }

    #[test]
    fn log_fault_unclassified_goes_to_error() {
        let out = logged_while_rendering(&Fault::unclassified("pool exhausted"));
        assert!(out.contains("ERROR"), "expected an ERROR record, got: {out}");
        assert!(out.contains("status_code=500"));
        assert_eq!(out.matches("non-operational error").count(), 1, "logged exactly once");
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = match axum::body::to_bytes(response.into_body(), 64 * 1024).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("invalid JSON: {e}"),
        }
    }

    #[tokio::test]
    async fn render_production_envelope_is_minimal() {
        let context = RequestContext::new("GET", "/x", "unknown");
        let response = render(&Fault::not_found(), &context, Environment::Production, Utc::now());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "Resource not found");
        assert_eq!(body["error"]["statusCode"], 404);
        assert!(body["error"].get("stack").is_none());
    }

    #[tokio::test]
    async fn render_development_envelope_includes_stack_and_details() {
        let context = RequestContext::new("PUT", "/y", "198.51.100.4");
        let fault = Fault::malformed_input("key must be a string at line 1 column 2");
        let response = render(&fault, &context, Environment::Development, Utc::now());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Invalid JSON");
        assert!(body["error"]["stack"].is_string());
        assert_eq!(body["error"]["details"]["message"], "key must be a string at line 1 column 2");
        assert_eq!(body["error"]["details"]["ip"], "198.51.100.4");
        assert_eq!(body["error"]["details"]["statusCode"], 400);
    }

    #[tokio::test]
    async fn render_rate_limit_sets_retry_after() {
        let context = RequestContext::new("GET", "/api/health", "unknown");
        let response =
            render(&Fault::rate_limited_retry_after(12), &context, Environment::Production, Utc::now());
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("12")
        );
    }

    #[test]
    fn panic_fault_parks_unclassified_fault() {
        let response = panic_fault(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match response.extensions().get::<Fault>() {
            Some(fault) => {
                assert_eq!(fault.kind(), FaultKind::Unclassified);
                assert_eq!(fault.message(), "panic: index out of bounds");
            }
            None => panic!("panic response must carry a fault"),
        }
    }
}
