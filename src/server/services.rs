//! Monitored service endpoints.
//!
//! Adding a service probes its certificate straight away; a failed probe
//! still stores the service, with an unknown expiry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{WatchError, WatchResult};
use crate::models::{MonitoredService, NewService};
use crate::server::handlers::{AppState, StatusResponse};
use crate::server::validation::{validate_email_list, validate_not_empty, validate_service_url};
use crate::store::ExpiryStore;

#[derive(Debug, Serialize)]
pub struct ServiceAddedResponse {
    pub status: &'static str,
    pub id: i64,
    pub certificate_expiry: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ExpiryFetchedResponse {
    pub status: &'static str,
    pub certificate_expiry: NaiveDate,
}

fn validate_service(service: &NewService) -> WatchResult<()> {
    validate_not_empty(&service.name, "name")?;
    validate_service_url(&service.url, "url")?;
    validate_email_list(&service.alert_email, "alert_email")?;
    Ok(())
}

/// `POST /services/add`
pub async fn add_service_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewService>,
) -> WatchResult<(StatusCode, Json<ServiceAddedResponse>)> {
    validate_service(&payload)?;

    let certificate_expiry = match state.prober.probe(&payload.url).await {
        Ok(expiry) => Some(expiry),
        Err(e) => {
            warn!(url = %payload.url, "Error checking certificate for {}: {e}", payload.url);
            None
        }
    };

    let id = state.db.insert_service(&payload, certificate_expiry).await?;
    info!(service_id = id, url = %payload.url, "Service added: {}", payload.name);

    Ok((
        StatusCode::CREATED,
        Json(ServiceAddedResponse {
            status: "Service added",
            id,
            certificate_expiry,
        }),
    ))
}

/// `PUT /services/update/:id`
pub async fn update_service_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewService>,
) -> WatchResult<Json<StatusResponse>> {
    validate_service(&payload)?;

    if !state.db.update_service(id, &payload).await? {
        return Err(WatchError::NotFound(format!("service {id}")));
    }

    info!(service_id = id, "Service updated");
    Ok(Json(StatusResponse {
        status: "Service updated",
    }))
}

/// `DELETE /services/delete/:id`
pub async fn delete_service_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> WatchResult<Json<StatusResponse>> {
    if !state.db.delete_service(id).await? {
        return Err(WatchError::NotFound(format!("service {id}")));
    }

    info!(service_id = id, "Service deleted");
    Ok(Json(StatusResponse {
        status: "Service deleted",
    }))
}

/// `GET /services/list`
pub async fn list_services_handler(
    State(state): State<AppState>,
) -> WatchResult<Json<Vec<MonitoredService>>> {
    let services = state.db.list_services().await?;
    Ok(Json(services))
}

/// `POST /services/fetch-expiry/:id`
///
/// A probe failure is reported as 502 and the stored expiry is left as is.
pub async fn fetch_expiry_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> WatchResult<Json<ExpiryFetchedResponse>> {
    let service = state
        .db
        .get_service(id)
        .await?
        .ok_or_else(|| WatchError::NotFound(format!("service {id}")))?;

    let expiry = state.prober.probe(&service.url).await.map_err(|e| {
        warn!(service_id = id, url = %service.url, "Error checking certificate for {}: {e}", service.url);
        WatchError::from(e)
    })?;

    if !state.db.update_service_expiry(id, Some(expiry)).await? {
        return Err(WatchError::NotFound(format!("service {id}")));
    }
    info!(service_id = id, "Updated certificate expiry for {}: {expiry}", service.url);

    Ok(Json(ExpiryFetchedResponse {
        status: "Expiry date updated",
        certificate_expiry: expiry,
    }))
}
