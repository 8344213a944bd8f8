//! Request validation for the CRUD endpoints.

use std::fmt;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

use crate::errors::WatchError;
use crate::models::split_recipients;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$";

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for WatchError {
    fn from(err: ValidationError) -> Self {
        WatchError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use expiry_watch::server::validation::validate_not_empty;
///
/// assert!(validate_not_empty("Billing", "name").is_ok());
/// assert!(validate_not_empty("   ", "name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field_name, "cannot be empty"))
    } else {
        Ok(())
    }
}

/// Validate a monitored service URL: `http` or `https` with a hostname.
pub fn validate_service_url(value: &str, field_name: &str) -> ValidationResult<()> {
    let parsed = Url::parse(value.trim())
        .map_err(|e| ValidationError::new(field_name, format!("invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new(
            field_name,
            "URL must start with http:// or https://",
        ));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ValidationError::new(field_name, "URL has no hostname")),
    }
}

/// Validate every address in a comma-separated list.
///
/// # Example
/// ```
/// use expiry_watch::server::validation::validate_email_list;
///
/// assert!(validate_email_list("ops@example.com, sec@example.com", "alert_email").is_ok());
/// assert!(validate_email_list("ops@example.com, nope", "alert_email").is_err());
/// ```
pub fn validate_email_list(value: &str, field_name: &str) -> ValidationResult<()> {
    let email_regex = Regex::new(EMAIL_PATTERN)
        .map_err(|e| ValidationError::new(field_name, format!("email pattern: {e}")))?;

    let recipients = split_recipients(value);
    if recipients.is_empty() {
        return Err(ValidationError::new(field_name, "at least one address is required"));
    }

    match recipients.iter().find(|r| !email_regex.is_match(r)) {
        Some(bad) => Err(ValidationError::new(
            field_name,
            format!("invalid email address: {bad}"),
        )),
        None => Ok(()),
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str, field_name: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::new(field_name, format!("invalid date '{value}', expected YYYY-MM-DD"))
    })
}
