//! HTTP surface for Expiry Watch.
//!
//! This module contains:
//! - `handlers`    → shared state, error mapping, health check
//! - `services`    → monitored service CRUD and on-demand probing
//! - `licenses`    → license CRUD
//! - `auth`        → operator accounts and JWT middleware
//! - `validation`  → request validation utilities
//! - `logging`     → request logging middleware
//! - `routes`      → router builder

pub mod auth;
pub mod handlers;
pub mod licenses;
pub mod logging;
pub mod routes;
pub mod services;
pub mod validation;

pub use auth::{
    hash_password, require_auth, verify_password, AuthError, AuthState, AuthenticatedUser, Claims,
    JwtValidator,
};
pub use handlers::{health_handler, AppState};
pub use routes::build_router;
pub use validation::{
    parse_date, validate_email_list, validate_not_empty, validate_service_url, ValidationError,
    ValidationResult,
};
