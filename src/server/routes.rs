use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::server::auth::{login_handler, register_handler, require_auth};
use crate::server::handlers::{health_handler, AppState};
use crate::server::licenses::{
    add_license_handler, delete_license_handler, list_licenses_handler, update_license_handler,
};
use crate::server::logging::request_logging_middleware;
use crate::server::services::{
    add_service_handler, delete_service_handler, fetch_expiry_handler, list_services_handler,
    update_service_handler,
};

/// Build the application router.
///
/// # Routes
///
/// ## Services
/// - `POST /services/add` - Add a service and probe its certificate
/// - `PUT /services/update/:id` - Replace name, URL and alert addresses
/// - `DELETE /services/delete/:id` - Remove a service
/// - `GET /services/list` - List services
/// - `POST /services/fetch-expiry/:id` - Re-probe one service now
///
/// ## Licenses
/// - `POST /licenses/add`, `PUT /licenses/update/:id`,
///   `DELETE /licenses/delete/:id`, `GET /licenses/list`
///
/// ## Open endpoints
/// - `POST /auth/register`, `POST /auth/login`
/// - `GET /health`
///
/// The service and license routes require a bearer token when
/// authentication is enabled.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/services/add", post(add_service_handler))
        .route("/services/update/:id", put(update_service_handler))
        .route("/services/delete/:id", delete(delete_service_handler))
        .route("/services/list", get(list_services_handler))
        .route("/services/fetch-expiry/:id", post(fetch_expiry_handler))
        .route("/licenses/add", post(add_license_handler))
        .route("/licenses/update/:id", put(update_license_handler))
        .route("/licenses/delete/:id", delete(delete_license_handler))
        .route("/licenses/list", get(list_licenses_handler));

    let protected = if state.auth.enabled {
        protected.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
    } else {
        protected
    };

    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
