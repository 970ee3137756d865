//! Input validation and sanitization helpers.
//!
//! Checks are pure predicates; sanitizers return new strings. Failures are
//! collected as [`FieldError`]s and folded into a single validation fault
//! with [`validation_fault`].

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use crate::Fault;

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"^[0-9a-fA-F]{24}$"));
static PASSWORD_CHARS: LazyLock<Regex> = LazyLock::new(|| compile(r"^[a-zA-Z0-9@$!%*?&]{8,}$"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\+?[1-9][0-9]{0,15}$"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| compile(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

#[expect(clippy::expect_used, reason = "patterns are compile-time constants")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static validation pattern must compile")
}

/// One failed rule on one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), value: None }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Fold field errors into one validation fault:
/// `"Validation failed: <message>, <message>"`.
#[must_use]
pub fn validation_fault(errors: &[FieldError]) -> Fault {
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    Fault::validation(format!("Validation failed: {}", messages.join(", ")))
}

/// 24 hexadecimal characters.
#[must_use]
pub fn is_valid_object_id(value: &str) -> bool {
    OBJECT_ID.is_match(value)
}

/// At least 8 characters from `[A-Za-z0-9@$!%*?&]` with one lowercase letter,
/// one uppercase letter and one digit.
#[must_use]
pub fn is_strong_password(password: &str) -> bool {
    PASSWORD_CHARS.is_match(password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Optional `+`, then up to 16 digits not starting with zero. Spaces, dashes
/// and parentheses are ignored.
#[must_use]
pub fn is_valid_phone_number(phone: &str) -> bool {
    PHONE.is_match(&sanitize_phone(phone))
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Parses as an absolute URL.
#[must_use]
pub fn is_valid_url(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[must_use]
pub fn is_valid_date(value: &str) -> bool {
    parse_date(value).is_some()
}

#[must_use]
pub fn is_future_date(value: &str, now: DateTime<Utc>) -> bool {
    parse_date(value).is_some_and(|d| d > now)
}

#[must_use]
pub fn is_past_date(value: &str, now: DateTime<Utc>) -> bool {
    parse_date(value).is_some_and(|d| d < now)
}

/// Strip angle brackets and surrounding whitespace.
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    input.replace(['<', '>'], "").trim().to_owned()
}

#[must_use]
pub fn sanitize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Drop spaces, dashes and parentheses.
#[must_use]
pub fn sanitize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')')).collect()
}
