//! Structured log record and JSON error envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Environment, Fault, RequestContext, Resolution};

/// Everything known about a fault at the pipeline boundary.
///
/// Logged for every fault; attached to the envelope as `details` in
/// development.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Raw fault message, before classification.
    pub message: String,
    pub stack: String,
    /// Resolved status.
    pub status_code: u16,
    pub url: String,
    pub method: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// ISO-8601 time at which the request entered the pipeline.
    pub received_at: String,
    /// ISO-8601 time at which the record was built.
    pub timestamp: String,
}

impl ErrorDetails {
    #[must_use]
    pub fn new(
        fault: &Fault,
        resolution: &Resolution,
        context: &RequestContext,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            message: fault.message().to_owned(),
            stack: fault.stack(),
            status_code: resolution.status,
            url: context.url.clone(),
            method: context.method.clone(),
            ip: context.ip.clone(),
            user_agent: context.user_agent.clone(),
            received_at: context.received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Body of every failed response: `{ "success": false, "error": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ErrorEnvelope {
    /// The minimal envelope: resolved message and status only.
    #[must_use]
    pub fn new(resolution: &Resolution) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                message: resolution.message.clone(),
                status_code: resolution.status,
                stack: None,
                details: None,
            },
        }
    }

    /// Build the envelope for `environment`; development additionally carries
    /// the stack text and the full log record.
    #[must_use]
    pub fn build(resolution: &Resolution, details: ErrorDetails, environment: Environment) -> Self {
        let mut envelope = Self::new(resolution);
        if environment.is_development() {
            envelope.error.stack = Some(details.stack.clone());
            envelope.error.details = Some(details);
        }
        envelope
    }
}
