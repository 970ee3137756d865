//! Fuzz target: classification and envelope rendering.
//!
//! Arbitrary messages must never change the resolved status of a fault kind
//! and every envelope must serialize.

#![no_main]

use keel_core::{classify, Environment, ErrorDetails, ErrorEnvelope, Fault, RequestContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let message = String::from_utf8_lossy(data).into_owned();
    let context = RequestContext::new("GET", message.clone(), "fuzz");

    let faults = [
        (Fault::validation(message.clone()), 400),
        (Fault::not_found_with(message.clone()), 404),
        (Fault::malformed_input(message.clone()), 400),
        (Fault::unclassified(message.clone()), 500),
    ];

    for (fault, status) in faults {
        let resolution = classify(&fault);
        assert_eq!(resolution.status, status);

        let details = ErrorDetails::new(&fault, &resolution, &context, chrono::Utc::now());
        let envelope = ErrorEnvelope::build(&resolution, details, Environment::Development);
        let json = serde_json::to_string(&envelope).expect("envelope serialization must not fail");
        assert!(json.starts_with(r#"{"success":false"#));
    }

    if let Some(&first) = data.first() {
        let status = 400 + u16::from(first) % 200;
        let fault = Fault::operational(status, message).expect("status in range must be accepted");
        assert_eq!(classify(&fault).status, status);
    }
});
