//! Axum router and route handlers for the keel gateway.

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{DefaultBodyLimit, OriginalUri, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use keel_core::{
    validate::{
        is_strong_password, is_valid_email, is_valid_phone_number, sanitize_email, sanitize_input,
        sanitize_phone, validation_fault,
    },
    Fault, FieldError,
};
use serde::{Deserialize, Serialize};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use crate::{
    config::{ConfigError, GatewayConfig},
    error::ApiFault,
    extract::JsonBody,
    pipeline::{error_pipeline, panic_fault},
    rate_limit::{throttle, Throttle},
    security::{cors_layer, with_security_headers},
};

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

// ── Shared state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<GatewayConfig>,
    started_at: Instant,
}

// ── Request / response types ──────────────────────────────────────────────────

/// Liveness report returned by both health routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub success: bool,
    pub status: String,
    pub timestamp: String,
    /// Seconds since the router was built.
    pub uptime: f64,
    pub environment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub api_version: String,
    pub health: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router.
///
/// # Errors
/// Returns [`ConfigError::Invalid`] if the throttling limits cannot be built.
pub fn create_router(config: Arc<GatewayConfig>) -> Result<Router, ConfigError> {
    let state = AppState { config: Arc::clone(&config), started_at: Instant::now() };

    let mut api = Router::new()
        .route("/health", get(health))
        .route("/validate/registration", post(validate_registration));
    if config.features.rate_limiting {
        let throttle_state = Arc::new(Throttle::new(&config)?);
        api = api.layer(middleware::from_fn_with_state(throttle_state, throttle));
    }

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    if config.features.compression {
        app = app.layer(CompressionLayer::new());
    }
    app = with_security_headers(app).layer(cors_layer(&config.cors));
    if config.features.logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    Ok(app
        .layer(CatchPanicLayer::custom(panic_fault))
        .layer(middleware::from_fn_with_state(config, error_pipeline)))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /` — service banner.
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(ServiceInfo {
        message: "Welcome to the keel API",
        version: env!("CARGO_PKG_VERSION"),
        api_version: state.config.server.api_version.clone(),
        health: "/health",
    })
}

/// `GET /health` and `GET /api/health` — liveness probe. Never fails.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("health check requested");
    (
        StatusCode::OK,
        Json(HealthReport {
            success: true,
            status: "OK".to_owned(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: state.started_at.elapsed().as_secs_f64(),
            environment: state.config.server.environment_name.clone(),
        }),
    )
}

/// `POST /api/validate/registration` — validate and sanitize a registration
/// form.
///
/// # Errors
/// Returns a validation fault listing every failed rule, or a malformed-input
/// fault if the body is not JSON.
pub async fn validate_registration(
    JsonBody(body): JsonBody<RegistrationBody>,
) -> Result<impl IntoResponse, ApiFault> {
    let registration = check_registration(&body)?;
    Ok(Json(DataResponse { success: true, data: registration }))
}

/// Fallback for unmatched routes and methods.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiFault {
    let target = uri.path_and_query().map_or_else(|| uri.path().to_owned(), ToString::to_string);
    ApiFault(Fault::not_found_with(format!("Route {target} not found")))
}

// ── Validation ────────────────────────────────────────────────────────────────

fn check_registration(body: &RegistrationBody) -> Result<Registration, Fault> {
    let name = sanitize_input(&body.name);
    let email = sanitize_email(&body.email);
    let phone = body.phone.as_deref().map(sanitize_phone);
    let mut errors = Vec::new();

    if !(1..=50).contains(&name.chars().count()) {
        errors.push(
            FieldError::new("name", "Name must be between 1 and 50 characters").with_value(&*name),
        );
    }
    if !is_valid_email(&email) {
        errors.push(
            FieldError::new("email", "Please provide a valid email address").with_value(&*email),
        );
    }
    if body.password.chars().count() < 8 {
        errors.push(FieldError::new("password", "Password must be at least 8 characters long"));
    } else if !is_strong_password(&body.password) {
        errors.push(FieldError::new(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ));
    }
    if body.confirm_password != body.password {
        errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
    }
    if let Some(phone) = phone.as_deref() {
        if !is_valid_phone_number(phone) {
            errors.push(
                FieldError::new("phone", "Please provide a valid phone number").with_value(phone),
            );
        }
    }

    if errors.is_empty() {
        Ok(Registration { name, email, phone })
    } else {
        Err(validation_fault(&errors))
    }
}
