//! Scheduled jobs for Expiry Watch.
//!
//! # Available Jobs
//!
//! - **Expiry Refresh**: re-probes every monitored service's TLS endpoint
//!   and stores the leaf certificate's expiry date.
//!
//! - **Alert Dispatch**: emails the alert addresses of every license and
//!   service whose expiry falls inside its alert window.
//!
//! The two jobs never call each other; they only share persisted state.
//! Trigger times are daily, in UTC.
//!
//! # Usage
//!
//! ```rust,ignore
//! use expiry_watch::jobs::ExpiryScheduler;
//!
//! let scheduler = ExpiryScheduler::new(store, prober, notifier, config.alerts).await?;
//! scheduler.start().await?;
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info};

use crate::config::AlertConfig;
use crate::errors::WatchError;
use crate::notify::Notifier;
use crate::probe::CertificateProber;
use crate::store::ExpiryStore;

mod alert_dispatch;
mod expiry_refresh;

pub use alert_dispatch::{
    certificate_alert, days_until, license_alert, run_alert_dispatch, DispatchReport,
};
pub use expiry_refresh::{run_expiry_refresh, RefreshReport};

/// Drives the two daily jobs.
pub struct ExpiryScheduler {
    scheduler: TokioJobScheduler,
    store: Arc<dyn ExpiryStore>,
    prober: Arc<dyn CertificateProber>,
    notifier: Arc<dyn Notifier>,
    alerts: AlertConfig,
}

impl ExpiryScheduler {
    /// Create a new scheduler. Nothing is armed until [`start`](Self::start).
    pub async fn new(
        store: Arc<dyn ExpiryStore>,
        prober: Arc<dyn CertificateProber>,
        notifier: Arc<dyn Notifier>,
        alerts: AlertConfig,
    ) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            store,
            prober,
            notifier,
            alerts,
        })
    }

    /// Arm both daily triggers and start the scheduler.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting expiry scheduler");

        self.add_expiry_refresh_job().await?;
        self.add_alert_dispatch_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Expiry scheduler started successfully");

        Ok(())
    }

    /// Stop the scheduler. A job already running is abandoned.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down expiry scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    async fn add_expiry_refresh_job(&self) -> Result<(), JobError> {
        let store = Arc::clone(&self.store);
        let prober = Arc::clone(&self.prober);
        let check_time = self.alerts.certificate.check_time;

        let job = Job::new_async(check_time.cron_expression().as_str(), move |_uuid, _l| {
            let store = Arc::clone(&store);
            let prober = Arc::clone(&prober);
            Box::pin(async move {
                // Errors end this run only; the trigger stays armed.
                if let Err(e) = run_expiry_refresh(&*store, &*prober).await {
                    error!("Certificate expiry check failed: {}", e);
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Added certificate expiry check job (daily at {} UTC)", check_time);

        Ok(())
    }

    async fn add_alert_dispatch_job(&self) -> Result<(), JobError> {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let alerts = self.alerts;
        let send_time = alerts.license.check_time;

        let job = Job::new_async(send_time.cron_expression().as_str(), move |_uuid, _l| {
            let store = Arc::clone(&store);
            let notifier = Arc::clone(&notifier);
            Box::pin(async move {
                let today = Utc::now().date_naive();
                if let Err(e) = run_alert_dispatch(&*store, &*notifier, &alerts, today).await {
                    error!("Alert dispatch failed: {}", e);
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added alert dispatch job (daily at {} UTC, certificate window: {} days, license window: {} days)",
            send_time, alerts.certificate.threshold_days, alerts.license.threshold_days
        );

        Ok(())
    }

    /// Run the expiry refresh immediately (manual trigger).
    pub async fn run_expiry_refresh_now(&self) -> Result<RefreshReport, JobError> {
        run_expiry_refresh(&*self.store, &*self.prober).await
    }

    /// Run the alert dispatch immediately against today's UTC date.
    pub async fn run_alert_dispatch_now(&self) -> Result<DispatchReport, JobError> {
        let today = Utc::now().date_naive();
        run_alert_dispatch(&*self.store, &*self.notifier, &self.alerts, today).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<WatchError> for JobError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::StorageError(msg) => JobError::StorageError(msg),
            other => JobError::StorageError(other.to_string()),
        }
    }
}
