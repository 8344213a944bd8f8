//! Expiry Watch - TLS certificate and license expiry monitoring
//!
//! Expiry Watch keeps an inventory of service URLs and software licenses,
//! refreshes each service's certificate expiry by probing it over TLS once
//! a day, and emails the configured addresses when anything is about to
//! lapse.
//!
//! # Features
//!
//! - `server` - CRUD HTTP surface (handlers, routes, JWT auth). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite)
//! expiry-watch = { path = "." }
//!
//! # Jobs only, on PostgreSQL
//! expiry-watch = { path = ".", default-features = false, features = ["postgres"] }
//! ```

// Core modules (always available)
pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod models;
pub mod notify;
pub mod probe;
pub mod store;

// Scheduled jobs
pub mod jobs;

// HTTP surface (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
