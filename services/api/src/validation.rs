//! Input validation utilities

use chrono::NaiveDate;
use common::format::normalize_subject;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::ApiError;

/// Normalise and validate a subject handle, returning the stored form
pub fn validate_subject(raw: &str) -> Result<String, ApiError> {
    let subject = normalize_subject(raw);
    if subject.is_empty() {
        return Err(ApiError::validation("Telegram @username is required"));
    }

    static SUBJECT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = SUBJECT_REGEX
        .get_or_init(|| Regex::new(r"^@[a-z0-9_]{3,32}$").expect("Failed to compile subject regex"));

    if !regex.is_match(&subject) {
        return Err(ApiError::validation(
            "Telegram username must be 3 to 32 letters, digits or underscores",
        ));
    }

    Ok(subject)
}

/// Validate a six digit verification code
pub fn validate_code(code: &str) -> Result<String, ApiError> {
    let code = code.trim();

    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        CODE_REGEX.get_or_init(|| Regex::new(r"^\d{6}$").expect("Failed to compile code regex"));

    if !regex.is_match(code) {
        return Err(ApiError::validation("Code must be 6 digits"));
    }

    Ok(code.to_string())
}

/// Validate a `YYYY-MM-DD` date
pub fn validate_date(date: &str) -> Result<String, ApiError> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("Date must be in YYYY-MM-DD format"))?;
    Ok(date.to_string())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    if email.len() > 254 {
        return Err(ApiError::validation("Email must be at most 254 characters long"));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(ApiError::validation("Invalid email format"));
    }

    Ok(email.to_string())
}

/// Require a non-blank value, returning it trimmed
pub fn require(field: &str, value: Option<&str>) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::validation(format!("{} is required", field))),
    }
}

/// Trim an optional value, mapping blanks to `None`
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalise a seat label (`" a3 "` becomes `"A3"`)
pub fn normalize_seat(seat_no: &str) -> String {
    seat_no.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert_eq!(validate_subject(" @Alice_99 ").unwrap(), "@alice_99");
        assert_eq!(validate_subject("bob").unwrap(), "@bob");
        assert!(validate_subject("").is_err());
        assert!(validate_subject("@ab").is_err());
        assert!(validate_subject("@al ice").is_err());
        assert!(validate_subject(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_code() {
        assert_eq!(validate_code(" 012345 ").unwrap(), "012345");
        assert!(validate_code("12345").is_err());
        assert!(validate_code("12345a").is_err());
        assert!(validate_code("1234567").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2025-12-10").is_ok());
        assert!(validate_date("2025-13-10").is_err());
        assert!(validate_date("10.12.2025").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_require_and_optional() {
        assert_eq!(require("Phone", Some(" 123 ")).unwrap(), "123");
        assert!(require("Phone", Some("  ")).is_err());
        assert!(require("Phone", None).is_err());
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" Ivanovich ")).as_deref(), Some("Ivanovich"));
        assert_eq!(normalize_seat(" a3 "), "A3");
    }
}
