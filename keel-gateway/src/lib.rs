//! HTTP gateway for the keel service.
//!
//! Wires the fault pipeline from `keel-core` into an axum router: every
//! handler fault, unmatched route and handler panic ends in exactly one JSON
//! error envelope rendered by [`pipeline::error_pipeline`].

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod rate_limit;
pub mod request_context;
pub mod routes;
pub mod security;
pub mod telemetry;
