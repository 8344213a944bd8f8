use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::database::Database;
use crate::errors::{ProbeError, WatchError};
use crate::probe::CertificateProber;
use crate::server::auth::AuthState;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub prober: Arc<dyn CertificateProber>,
    pub auth: AuthState,
}

/// Standard error response body for HTTP errors.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Map internal `WatchError` into an HTTP response.
///
/// Handlers return `Result<_, WatchError>` and Axum converts both arms.
impl IntoResponse for WatchError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WatchError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WatchError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            WatchError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            WatchError::Probe(ProbeError::InvalidUrl(_)) => (StatusCode::BAD_GATEWAY, "INVALID_URL"),
            WatchError::Probe(_) => (StatusCode::BAD_GATEWAY, "PROBE_FAILED"),
            WatchError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            WatchError::ConfigError(_) | WatchError::ServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        if status.is_server_error() {
            warn!(%status, "request failed: {self}");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Body returned by the mutating endpoints.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub database_connected: bool,
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connected = state.db.ping().await;
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if connected { "healthy" } else { "degraded" },
            database: state.db.db_type(),
            database_connected: connected,
        }),
    )
}
