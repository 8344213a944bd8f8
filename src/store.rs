//! Repository interface the scheduled jobs depend on.
//!
//! Jobs take a snapshot with one `list_*` call per run and then mutate
//! rows one at a time. Implementations must give read-your-writes
//! consistency for sequential calls; no multi-row transaction is needed.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::WatchResult;
use crate::models::{License, MonitoredService};

#[async_trait]
pub trait ExpiryStore: Send + Sync {
    /// All monitored services in storage order.
    async fn list_services(&self) -> WatchResult<Vec<MonitoredService>>;

    /// Overwrite the stored certificate expiry of one service.
    ///
    /// Returns `Ok(false)` when the row no longer exists.
    async fn update_service_expiry(&self, id: i64, expiry: Option<NaiveDate>)
        -> WatchResult<bool>;

    /// All licenses in storage order.
    async fn list_licenses(&self) -> WatchResult<Vec<License>>;
}
