//! License endpoints.
//!
//! Alert addresses on licenses are stored as given; only services have
//! their addresses checked.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::{WatchError, WatchResult};
use crate::models::{License, NewLicense};
use crate::server::handlers::{AppState, StatusResponse};
use crate::server::validation::{parse_date, validate_not_empty};
use crate::store::ExpiryStore;

/// Request body for creating or replacing a license.
#[derive(Debug, Deserialize)]
pub struct LicenseRequest {
    pub name: String,
    /// `YYYY-MM-DD`
    pub expiry_date: String,
    pub alert_email: String,
}

impl LicenseRequest {
    fn into_new_license(self) -> WatchResult<NewLicense> {
        validate_not_empty(&self.name, "name")?;
        let expiry_date = parse_date(&self.expiry_date, "expiry_date")?;

        Ok(NewLicense {
            name: self.name,
            expiry_date,
            alert_email: self.alert_email,
        })
    }
}

/// `POST /licenses/add`
pub async fn add_license_handler(
    State(state): State<AppState>,
    Json(payload): Json<LicenseRequest>,
) -> WatchResult<(StatusCode, Json<StatusResponse>)> {
    let license = payload.into_new_license()?;
    let id = state.db.insert_license(&license).await?;

    info!(license_id = id, "License added: {} (expires {})", license.name, license.expiry_date);

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse {
            status: "License added",
        }),
    ))
}

/// `PUT /licenses/update/:id`
pub async fn update_license_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LicenseRequest>,
) -> WatchResult<Json<StatusResponse>> {
    let license = payload.into_new_license()?;

    if !state.db.update_license(id, &license).await? {
        return Err(WatchError::NotFound(format!("license {id}")));
    }

    info!(license_id = id, "License updated");
    Ok(Json(StatusResponse {
        status: "License updated",
    }))
}

/// `DELETE /licenses/delete/:id`
pub async fn delete_license_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> WatchResult<Json<StatusResponse>> {
    if !state.db.delete_license(id).await? {
        return Err(WatchError::NotFound(format!("license {id}")));
    }

    info!(license_id = id, "License deleted");
    Ok(Json(StatusResponse {
        status: "License deleted",
    }))
}

/// `GET /licenses/list`
pub async fn list_licenses_handler(
    State(state): State<AppState>,
) -> WatchResult<Json<Vec<License>>> {
    let licenses = state.db.list_licenses().await?;
    Ok(Json(licenses))
}
