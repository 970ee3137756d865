//! Request extractors that reject with an [`ApiFault`].

use axum::{extract::FromRequest, Json};

use crate::error::ApiFault;

/// JSON body extractor.
///
/// Unparsable payloads become a malformed-input fault, well-formed payloads of
/// the wrong shape a validation fault.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiFault))]
pub struct JsonBody<T>(pub T);
