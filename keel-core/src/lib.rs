//! Core types for the keel request fault pipeline.
//!
//! Defines the closed fault taxonomy, the classification step that resolves a
//! fault into a status/message/severity triple, the structured log record and
//! the JSON error envelope returned to clients. Nothing here depends on an HTTP
//! framework; the gateway crate wires these types into middleware.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod classify;
pub mod context;
pub mod envelope;
pub mod environment;
pub mod error;
pub mod fault;
pub mod validate;

pub use classify::{classify, Resolution};
pub use context::RequestContext;
pub use envelope::{ErrorBody, ErrorDetails, ErrorEnvelope};
pub use environment::Environment;
pub use error::CoreError;
pub use fault::{Fault, FaultKind};
pub use validate::FieldError;
