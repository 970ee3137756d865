//! Fuzz target: input sanitizers and validators.

#![no_main]

use keel_core::validate::{
    is_strong_password, is_valid_email, is_valid_phone_number, sanitize_email, sanitize_input,
    sanitize_phone,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let clean = sanitize_input(input);
    assert!(!clean.contains('<') && !clean.contains('>'));

    let phone = sanitize_phone(input);
    assert!(!phone.contains(['(', ')', '-', ' ']));

    let _ = sanitize_email(input);
    let _ = is_valid_email(input);
    let _ = is_valid_phone_number(input);
    let _ = is_strong_password(input);
});
