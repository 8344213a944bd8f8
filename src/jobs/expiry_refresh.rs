//! Expiry refresh job.
//!
//! Re-probes every monitored service and persists the leaf certificate's
//! expiry date. A probe failure leaves that row untouched and the loop
//! moves on to the next service.

use tracing::{debug, error, info, warn};

use crate::probe::CertificateProber;
use crate::store::ExpiryStore;

use super::JobError;

/// Outcome of one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Services in the snapshot
    pub checked: u32,
    /// Services whose expiry was written
    pub updated: u32,
    /// Services skipped because the probe or the write failed
    pub failed: u32,
    /// Services deleted between the snapshot and the write
    pub missing: u32,
}

/// Probe every service in a snapshot taken at the start of the run.
///
/// Only a failure to read the snapshot aborts the run.
pub async fn run_expiry_refresh(
    store: &dyn ExpiryStore,
    prober: &dyn CertificateProber,
) -> Result<RefreshReport, JobError> {
    info!("Running certificate expiry check...");

    let services = store.list_services().await?;
    let mut report = RefreshReport::default();

    for service in services {
        report.checked += 1;
        debug!(service_id = service.id, url = %service.url, "probing certificate");

        let expiry = match prober.probe(&service.url).await {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!(
                    service_id = service.id,
                    url = %service.url,
                    "Error checking certificate for {}: {e}",
                    service.url
                );
                report.failed += 1;
                continue;
            }
        };

        match store.update_service_expiry(service.id, Some(expiry)).await {
            Ok(false) => {
                report.missing += 1;
                debug!(
                    service_id = service.id,
                    "{} was removed before its expiry could be stored", service.name
                );
            }
            Ok(true) => {
                report.updated += 1;
                info!(
                    service_id = service.id,
                    "Updated certificate expiry for {} ({}): {expiry}",
                    service.name,
                    service.url
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(
                    service_id = service.id,
                    "Failed to store certificate expiry for {}: {e}", service.name
                );
            }
        }
    }

    info!(
        checked = report.checked,
        updated = report.updated,
        failed = report.failed,
        missing = report.missing,
        "Certificate expiry check finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    // Integration tests are in tests/jobs_tests.rs
}
