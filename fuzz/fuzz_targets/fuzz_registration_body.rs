//! Fuzz target: JSON deserialization of `RegistrationBody`.
//!
//! Verifies that arbitrary byte sequences fed to the registration body parser
//! never cause panics or UB.

#![no_main]

use keel_gateway::routes::RegistrationBody;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are expected; panics are not.
    let _ = serde_json::from_slice::<RegistrationBody>(data);
});
