//! Alert dispatch job.
//!
//! Scans licenses, then services, and emails the alert addresses of every
//! record whose expiry falls inside its alert window. There is no
//! "already alerted" state: a record inside its window is alerted on every
//! run until it expires or is renewed.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::AlertConfig;
use crate::models::{split_recipients, License, MonitoredService};
use crate::notify::Notifier;
use crate::store::ExpiryStore;

use super::JobError;

/// Outcome of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// License alerts accepted by the relay
    pub license_alerts: u32,
    /// Certificate alerts accepted by the relay
    pub certificate_alerts: u32,
    /// Alerts that were due but could not be delivered
    pub failed: u32,
}

impl DispatchReport {
    /// Alerts due this run, delivered or not.
    pub fn due(&self) -> u32 {
        self.license_alerts + self.certificate_alerts + self.failed
    }
}

/// Whole days from `today` until `expiry`; negative once expired.
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Subject and body of a license alert.
pub fn license_alert(license: &License, days_left: i64) -> (String, String) {
    let subject = format!("License Expiry Warning: {}", license.name);
    let body = format!(
        "The license '{}' is expiring on {}.\n\nDays remaining: {days_left}\n",
        license.name,
        license.expiry_date.format("%Y-%m-%d")
    );
    (subject, body)
}

/// Subject and body of a certificate alert.
pub fn certificate_alert(
    service: &MonitoredService,
    expiry: NaiveDate,
    days_left: i64,
) -> (String, String) {
    let subject = format!("Certificate Expiry Warning: {}", service.name);
    let body = format!(
        "The SSL certificate for '{}' ({}) is expiring on {}.\n\nDays remaining: {days_left}\n",
        service.name,
        service.url,
        expiry.format("%Y-%m-%d")
    );
    (subject, body)
}

/// Run both passes against snapshots read at the start of the run.
///
/// A storage failure while reading either snapshot aborts the run before
/// any email is sent. Notification failures are logged and counted.
pub async fn run_alert_dispatch(
    store: &dyn ExpiryStore,
    notifier: &dyn Notifier,
    alerts: &AlertConfig,
    today: NaiveDate,
) -> Result<DispatchReport, JobError> {
    info!("Sending alerts for {today}...");

    let licenses = store.list_licenses().await?;
    let services = store.list_services().await?;
    let mut report = DispatchReport::default();

    for license in &licenses {
        let days_left = days_until(license.expiry_date, today);
        if !alerts.license.contains(days_left) {
            continue;
        }

        let (subject, body) = license_alert(license, days_left);
        let recipients = split_recipients(&license.alert_email);

        if notifier.notify(&recipients, &subject, &body).await {
            report.license_alerts += 1;
            info!(
                license_id = license.id,
                "Alert email sent for license: {} -> {}", license.name, license.alert_email
            );
        } else {
            report.failed += 1;
        }
    }

    for service in &services {
        let Some(expiry) = service.certificate_expiry else {
            debug!(service_id = service.id, "no known certificate expiry, skipping");
            continue;
        };

        let days_left = days_until(expiry, today);
        if !alerts.certificate.contains(days_left) {
            continue;
        }

        let (subject, body) = certificate_alert(service, expiry, days_left);
        let recipients = split_recipients(&service.alert_email);

        if notifier.notify(&recipients, &subject, &body).await {
            report.certificate_alerts += 1;
            info!(
                service_id = service.id,
                "Alert email sent for certificate: {} -> {}", service.name, service.alert_email
            );
        } else {
            report.failed += 1;
        }
    }

    info!(
        license_alerts = report.license_alerts,
        certificate_alerts = report.certificate_alerts,
        failed = report.failed,
        "Alert dispatch finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_until_counts_calendar_days() {
        let today = date(2026, 10, 16);
        assert_eq!(days_until(date(2026, 10, 16), today), 0);
        assert_eq!(days_until(date(2026, 10, 21), today), 5);
        assert_eq!(days_until(date(2026, 11, 1), today), 16);
        assert_eq!(days_until(date(2026, 10, 15), today), -1);
    }

    #[test]
    fn license_alert_names_license_and_date() {
        let license = License {
            id: 1,
            name: "ProLicense".to_string(),
            expiry_date: date(2026, 10, 21),
            alert_email: "ops@example.com".to_string(),
        };

        let (subject, body) = license_alert(&license, 5);
        assert_eq!(subject, "License Expiry Warning: ProLicense");
        assert!(body.contains("'ProLicense'"));
        assert!(body.contains("2026-10-21"));
        assert!(body.contains("Days remaining: 5"));
    }

    #[test]
    fn certificate_alert_includes_url() {
        let service = MonitoredService {
            id: 7,
            name: "Billing".to_string(),
            url: "https://billing.example.com".to_string(),
            alert_email: "ops@example.com".to_string(),
            certificate_expiry: Some(date(2026, 10, 20)),
        };

        let (subject, body) = certificate_alert(&service, date(2026, 10, 20), 4);
        assert_eq!(subject, "Certificate Expiry Warning: Billing");
        assert!(body.contains("https://billing.example.com"));
        assert!(body.contains("2026-10-20"));
    }

    #[test]
    fn report_counts_due_alerts() {
        let report = DispatchReport {
            license_alerts: 2,
            certificate_alerts: 1,
            failed: 1,
        };
        assert_eq!(report.due(), 4);
    }
}
