//! The closed taxonomy of request faults.
//!
//! A [`Fault`] is raised at the point of failure and travels unchanged to the
//! pipeline boundary, where [`crate::classify`] resolves it exactly once.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt,
    sync::Arc,
};

use crate::CoreError;

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests";
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Payload too large";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Kind of a raised fault.
///
/// Every kind except [`FaultKind::MalformedInput`] and
/// [`FaultKind::Unclassified`] is operational: an expected, client-facing
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Request input failed validation (400).
    Validation,
    /// The addressed resource does not exist (404).
    NotFound,
    /// The client exceeded its request budget (429).
    RateLimited {
        /// Seconds until the client may retry, when known.
        retry_after_secs: Option<u64>,
    },
    /// The request body exceeded the configured size limit (413).
    PayloadTooLarge,
    /// An application fault carrying its own status in `400..=599`.
    Operational { status: u16 },
    /// The inbound payload could not be parsed (400 "Invalid JSON").
    MalformedInput,
    /// Anything else; treated as a defect (500).
    Unclassified,
}

impl FaultKind {
    /// Stable name used as the first line of a fault's stack text.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Validation => "ValidationFault",
            Self::NotFound => "NotFoundFault",
            Self::RateLimited { .. } => "RateLimitFault",
            Self::PayloadTooLarge => "PayloadTooLargeFault",
            Self::Operational { .. } => "OperationalFault",
            Self::MalformedInput => "MalformedInputFault",
            Self::Unclassified => "UnclassifiedFault",
        }
    }

    #[must_use]
    pub fn is_operational(self) -> bool {
        match self {
            Self::Validation
            | Self::NotFound
            | Self::RateLimited { .. }
            | Self::PayloadTooLarge
            | Self::Operational { .. } => true,
            Self::MalformedInput | Self::Unclassified => false,
        }
    }
}

/// A failure raised while handling a request.
///
/// Cloning is cheap: the captured backtrace is shared.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: FaultKind,
    message: String,
    backtrace: Arc<Backtrace>,
}

impl Fault {
    fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// A validation failure with a caller-supplied message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Validation, message)
    }

    /// A not-found fault with the default message.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(FaultKind::NotFound, NOT_FOUND_MESSAGE)
    }

    /// A not-found fault with a specific message.
    pub fn not_found_with(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, message)
    }

    /// A rate-limit fault with the default message and no retry hint.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new(FaultKind::RateLimited { retry_after_secs: None }, RATE_LIMIT_MESSAGE)
    }

    /// A rate-limit fault telling the client when to retry.
    #[must_use]
    pub fn rate_limited_retry_after(secs: u64) -> Self {
        Self::new(
            FaultKind::RateLimited { retry_after_secs: Some(secs) },
            RATE_LIMIT_MESSAGE,
        )
    }

    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(FaultKind::PayloadTooLarge, PAYLOAD_TOO_LARGE_MESSAGE)
    }

    /// An operational fault with an explicit status.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidStatus`] if `status` is not in `400..=599`.
    pub fn operational(status: u16, message: impl Into<String>) -> Result<Self, CoreError> {
        if !(400..=599).contains(&status) {
            return Err(CoreError::InvalidStatus { status });
        }
        Ok(Self::new(FaultKind::Operational { status }, message))
    }

    /// A payload parse failure. `detail` is the parser's own description and is
    /// only ever logged, never returned to the client.
    pub fn malformed_input(detail: impl Into<String>) -> Self {
        Self::new(FaultKind::MalformedInput, detail)
    }

    /// Any other failure.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unclassified, message)
    }

    /// Wrap an arbitrary error as an unclassified fault, keeping its source
    /// chain in the message.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::unclassified(message)
    }

    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The raw message the fault was raised with.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.kind.is_operational()
    }

    /// Human-readable trace text.
    ///
    /// The first line is always `"<KindName>: <message>"`; captured frames
    /// follow when backtrace capture is enabled (`RUST_BACKTRACE`).
    #[must_use]
    pub fn stack(&self) -> String {
        let mut stack = format!("{}: {}", self.kind.name(), self.message);
        if self.backtrace.status() == BacktraceStatus::Captured {
            stack.push('\n');
            stack.push_str(&self.backtrace.to_string());
        }
        stack
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {}
