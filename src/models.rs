//! Records tracked by Expiry Watch.
//!
//! These mirror the `services`, `licenses` and `users` tables. Dates are
//! calendar dates with no time-of-day component.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A service URL whose TLS certificate is monitored.
///
/// `certificate_expiry` is `None` until the endpoint has been probed
/// successfully at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct MonitoredService {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// One or more comma-separated addresses
    pub alert_email: String,
    pub certificate_expiry: Option<NaiveDate>,
}

/// A software license with a fixed expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct License {
    pub id: i64,
    pub name: String,
    pub expiry_date: NaiveDate,
    /// One or more comma-separated addresses
    pub alert_email: String,
}

/// Fields for creating or replacing a monitored service.
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub url: String,
    pub alert_email: String,
}

/// Fields for creating or replacing a license.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub name: String,
    pub expiry_date: NaiveDate,
    pub alert_email: String,
}

/// An operator account for the HTTP surface.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// Split a comma-separated `alert_email` field into recipients.
///
/// Entries are trimmed and empty entries dropped. No deduplication and no
/// address validation happens here.
pub fn split_recipients(alert_email: &str) -> Vec<String> {
    alert_email
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_recipients_trims_each_address() {
        let recipients = split_recipients("ops@example.com, sec@example.com ,dev@example.com");
        assert_eq!(
            recipients,
            vec!["ops@example.com", "sec@example.com", "dev@example.com"]
        );
    }

    #[test]
    fn split_recipients_keeps_duplicates() {
        let recipients = split_recipients("ops@example.com,ops@example.com");
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn split_recipients_drops_empty_segments() {
        assert_eq!(split_recipients("ops@example.com,, "), vec!["ops@example.com"]);
        assert!(split_recipients("").is_empty());
    }
}
