//! Fault classification.

use crate::fault::{Fault, FaultKind, INTERNAL_ERROR_MESSAGE, INVALID_JSON_MESSAGE};

/// The outcome of classifying a fault: what the client is told and how
/// loudly the fault is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// HTTP status written to the response.
    pub status: u16,
    /// Client-facing message.
    pub message: String,
    /// `true` routes the log record to the warning sink, `false` to the
    /// error sink.
    pub operational: bool,
}

impl Resolution {
    fn operational(status: u16, message: &str) -> Self {
        Self { status, message: message.to_owned(), operational: true }
    }

    fn defect(status: u16, message: &str) -> Self {
        Self { status, message: message.to_owned(), operational: false }
    }
}

/// Resolve a fault into its status, message and severity.
///
/// Operational kinds keep their own message. A malformed payload always
/// resolves to 400 "Invalid JSON" but is logged at error severity like a
/// defect; everything else becomes 500 "Internal Server Error".
#[must_use]
pub fn classify(fault: &Fault) -> Resolution {
    match fault.kind() {
        FaultKind::Validation => Resolution::operational(400, fault.message()),
        FaultKind::NotFound => Resolution::operational(404, fault.message()),
        FaultKind::RateLimited { .. } => Resolution::operational(429, fault.message()),
        FaultKind::PayloadTooLarge => Resolution::operational(413, fault.message()),
        FaultKind::Operational { status } => Resolution::operational(status, fault.message()),
        FaultKind::MalformedInput => Resolution::defect(400, INVALID_JSON_MESSAGE),
        FaultKind::Unclassified => Resolution::defect(500, INTERNAL_ERROR_MESSAGE),
    }
}
