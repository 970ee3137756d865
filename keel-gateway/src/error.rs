//! Error types for the gateway crate.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keel_core::{classify, ErrorEnvelope, Fault};

use crate::{config::ConfigError, telemetry::TelemetryError};

/// A request fault returned from a handler or middleware.
///
/// Converting to a response parks the [`Fault`] in the response extensions
/// with a minimal envelope; [`crate::pipeline::error_pipeline`] picks it up
/// and renders the final response.
#[derive(Debug)]
pub struct ApiFault(pub Fault);

impl From<Fault> for ApiFault {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

impl IntoResponse for ApiFault {
    fn into_response(self) -> Response {
        let resolution = classify(&self.0);
        let status =
            StatusCode::from_u16(resolution.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(ErrorEnvelope::new(&resolution))).into_response();
        response.extensions_mut().insert(self.0);
        response
    }
}

impl From<JsonRejection> for ApiFault {
    fn from(rejection: JsonRejection) -> Self {
        let fault = match rejection {
            JsonRejection::JsonSyntaxError(e) => Fault::malformed_input(e.body_text()),
            JsonRejection::JsonDataError(e) => Fault::validation(e.body_text()),
            JsonRejection::MissingJsonContentType(e) => Fault::validation(e.body_text()),
            JsonRejection::BytesRejection(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Fault::payload_too_large()
            }
            other => Fault::unclassified(other.body_text()),
        };
        Self(fault)
    }
}

/// Errors that abort gateway startup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server loop exited with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
