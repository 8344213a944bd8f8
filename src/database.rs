use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{query, query_as, query_scalar};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::errors::{WatchError, WatchResult};
use crate::models::{License, MonitoredService, NewLicense, NewService, User};
use crate::store::ExpiryStore;

#[cfg(feature = "sqlite")]
const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        name               TEXT NOT NULL UNIQUE,
        url                TEXT NOT NULL UNIQUE,
        alert_email        TEXT NOT NULL,
        certificate_expiry TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        expiry_date TEXT NOT NULL,
        alert_email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )
    "#,
];

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id                 BIGSERIAL PRIMARY KEY,
        name               TEXT NOT NULL UNIQUE,
        url                TEXT NOT NULL UNIQUE,
        alert_email        TEXT NOT NULL,
        certificate_expiry DATE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        expiry_date DATE NOT NULL,
        alert_email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )
    "#,
];

/// Map a sqlx error into the crate error, surfacing unique violations as conflicts.
fn db_err(op: &str, e: sqlx::Error) -> WatchError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return WatchError::Conflict(format!("{op}: record already exists"));
        }
    }
    error!("{op} failed: {e}");
    WatchError::StorageError(format!("{op}: {e}"))
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Connect using the database section of the configuration.
    pub async fn new(config: &DatabaseConfig) -> WatchResult<Arc<Self>> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePool::connect(&config.sqlite_url).await.map_err(|e| {
                    error!("Failed to connect to SQLite: {e}");
                    WatchError::StorageError(format!("failed to connect to SQLite: {e}"))
                })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(WatchError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPool::connect(&config.postgres_url).await.map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {e}");
                    WatchError::StorageError(format!("failed to connect to PostgreSQL: {e}"))
                })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(WatchError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(WatchError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create the `services`, `licenses` and `users` tables if missing.
    pub async fn migrate(&self) -> WatchResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    query(*statement)
                        .execute(pool)
                        .await
                        .map_err(|e| db_err("SQLite migrate", e))?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    query(*statement)
                        .execute(pool)
                        .await
                        .map_err(|e| db_err("Postgres migrate", e))?;
                }
            }
        }

        info!("Database schema is up to date ({})", self.db_type());
        Ok(())
    }

    /// Name of the active backend.
    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Cheap connectivity check for health reporting.
    pub async fn ping(&self) -> bool {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("SELECT 1").execute(pool).await,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("SELECT 1").execute(pool).await,
        };
        result.is_ok()
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    /// Fetch a service by id.
    pub async fn get_service(&self, id: i64) -> WatchResult<Option<MonitoredService>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, MonitoredService>(
                "SELECT id, name, url, alert_email, certificate_expiry FROM services WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("SQLite get_service", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, MonitoredService>(
                "SELECT id, name, url, alert_email, certificate_expiry FROM services WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("Postgres get_service", e)),
        }
    }

    /// Insert a service and return its id.
    pub async fn insert_service(
        &self,
        service: &NewService,
        certificate_expiry: Option<NaiveDate>,
    ) -> WatchResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(
                "INSERT INTO services (name, url, alert_email, certificate_expiry) \
                 VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(&service.name)
            .bind(&service.url)
            .bind(&service.alert_email)
            .bind(certificate_expiry)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("SQLite insert_service", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(
                "INSERT INTO services (name, url, alert_email, certificate_expiry) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&service.name)
            .bind(&service.url)
            .bind(&service.alert_email)
            .bind(certificate_expiry)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("Postgres insert_service", e)),
        }
    }

    /// Replace the name, url and alert addresses of a service.
    ///
    /// Returns `Ok(false)` when no row matched.
    pub async fn update_service(&self, id: i64, service: &NewService) -> WatchResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE services SET name = ?, url = ?, alert_email = ? WHERE id = ?",
            )
            .bind(&service.name)
            .bind(&service.url)
            .bind(&service.alert_email)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| db_err("SQLite update_service", e))?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE services SET name = $1, url = $2, alert_email = $3 WHERE id = $4",
            )
            .bind(&service.name)
            .bind(&service.url)
            .bind(&service.alert_email)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| db_err("Postgres update_service", e))?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Set the stored certificate expiry of a service.
    ///
    /// Returns `Ok(false)` when no row matched.
    pub async fn set_certificate_expiry(
        &self,
        id: i64,
        expiry: Option<NaiveDate>,
    ) -> WatchResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("UPDATE services SET certificate_expiry = ? WHERE id = ?")
                    .bind(expiry)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_err("SQLite set_certificate_expiry", e))?
                    .rows_affected()
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("UPDATE services SET certificate_expiry = $1 WHERE id = $2")
                    .bind(expiry)
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| db_err("Postgres set_certificate_expiry", e))?
                    .rows_affected()
            }
        };

        Ok(rows_affected > 0)
    }

    /// Delete a service. Returns `Ok(false)` when no row matched.
    pub async fn delete_service(&self, id: i64) -> WatchResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("DELETE FROM services WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("SQLite delete_service", e))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("DELETE FROM services WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("Postgres delete_service", e))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    // ------------------------------------------------------------------
    // Licenses
    // ------------------------------------------------------------------

    /// Fetch a license by id.
    pub async fn get_license(&self, id: i64) -> WatchResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(
                "SELECT id, name, expiry_date, alert_email FROM licenses WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("SQLite get_license", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(
                "SELECT id, name, expiry_date, alert_email FROM licenses WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("Postgres get_license", e)),
        }
    }

    /// Insert a license and return its id.
    pub async fn insert_license(&self, license: &NewLicense) -> WatchResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(
                "INSERT INTO licenses (name, expiry_date, alert_email) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(&license.name)
            .bind(license.expiry_date)
            .bind(&license.alert_email)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("SQLite insert_license", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(
                "INSERT INTO licenses (name, expiry_date, alert_email) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&license.name)
            .bind(license.expiry_date)
            .bind(&license.alert_email)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("Postgres insert_license", e)),
        }
    }

    /// Replace every field of a license. Returns `Ok(false)` when no row matched.
    pub async fn update_license(&self, id: i64, license: &NewLicense) -> WatchResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE licenses SET name = ?, expiry_date = ?, alert_email = ? WHERE id = ?",
            )
            .bind(&license.name)
            .bind(license.expiry_date)
            .bind(&license.alert_email)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| db_err("SQLite update_license", e))?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE licenses SET name = $1, expiry_date = $2, alert_email = $3 WHERE id = $4",
            )
            .bind(&license.name)
            .bind(license.expiry_date)
            .bind(&license.alert_email)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| db_err("Postgres update_license", e))?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Delete a license. Returns `Ok(false)` when no row matched.
    pub async fn delete_license(&self, id: i64) -> WatchResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("DELETE FROM licenses WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("SQLite delete_license", e))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("DELETE FROM licenses WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("Postgres delete_license", e))?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert an operator account. Duplicate usernames yield `WatchError::Conflict`.
    pub async fn insert_user(&self, username: &str, password_hash: &str) -> WatchResult<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(
                "INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id",
            )
            .bind(username)
            .bind(password_hash)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("SQLite insert_user", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(
                "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
            )
            .bind(username)
            .bind(password_hash)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("Postgres insert_user", e)),
        }
    }

    /// Look up an operator account by username.
    pub async fn get_user(&self, username: &str) -> WatchResult<Option<User>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, User>(
                "SELECT id, username, password_hash FROM users WHERE username = ?",
            )
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("SQLite get_user", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, User>(
                "SELECT id, username, password_hash FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("Postgres get_user", e)),
        }
    }
}

#[async_trait]
impl ExpiryStore for Database {
    async fn list_services(&self) -> WatchResult<Vec<MonitoredService>> {
        let sql = "SELECT id, name, url, alert_email, certificate_expiry FROM services ORDER BY id";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, MonitoredService>(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| db_err("SQLite list_services", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, MonitoredService>(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| db_err("Postgres list_services", e)),
        }
    }

    async fn update_service_expiry(
        &self,
        id: i64,
        expiry: Option<NaiveDate>,
    ) -> WatchResult<bool> {
        self.set_certificate_expiry(id, expiry).await
    }

    async fn list_licenses(&self) -> WatchResult<Vec<License>> {
        let sql = "SELECT id, name, expiry_date, alert_email FROM licenses ORDER BY id";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| db_err("SQLite list_licenses", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| db_err("Postgres list_licenses", e)),
        }
    }
}
