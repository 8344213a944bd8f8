#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;

use expiry_watch::config::DatabaseConfig;
use expiry_watch::database::Database;
use expiry_watch::errors::{WatchError, WatchResult};
use expiry_watch::models::{NewLicense, NewService};
use expiry_watch::store::ExpiryStore;

/// Helper: create an in-memory SQLite Database with all tables.
async fn setup_in_memory_db() -> WatchResult<Arc<Database>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| WatchError::StorageError(format!("db connect failed: {e}")))?;

    let db = Database::SQLite(pool);
    db.migrate().await?;
    Ok(Arc::new(db))
}

fn service(name: &str, url: &str) -> NewService {
    NewService {
        name: name.to_string(),
        url: url.to_string(),
        alert_email: "ops@example.com".to_string(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn migrate_is_idempotent() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;
    db.migrate().await?;
    assert!(db.ping().await);
    assert_eq!(db.db_type(), "sqlite");
    Ok(())
}

#[tokio::test]
async fn connect_from_config_creates_file_database() -> WatchResult<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.db");
    let config = DatabaseConfig {
        db_type: "sqlite".to_string(),
        sqlite_url: format!("sqlite://{}?mode=rwc", path.display()),
        ..Default::default()
    };

    let db = Database::new(&config).await?;
    db.migrate().await?;
    db.insert_service(&service("Billing", "https://billing.example.com"), None)
        .await?;

    assert!(path.exists());
    assert_eq!(db.list_services().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_database_type_is_a_config_error() {
    let config = DatabaseConfig {
        db_type: "mysql".to_string(),
        ..Default::default()
    };

    assert!(matches!(
        Database::new(&config).await,
        Err(WatchError::ConfigError(_))
    ));
}

#[tokio::test]
async fn service_crud_round_trip() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;

    let id = db
        .insert_service(
            &service("Billing", "https://billing.example.com"),
            Some(date(2027, 3, 1)),
        )
        .await?;

    let stored = db.get_service(id).await?.expect("service should exist");
    assert_eq!(stored.name, "Billing");
    assert_eq!(stored.certificate_expiry, Some(date(2027, 3, 1)));

    let updated = db
        .update_service(id, &service("Billing v2", "https://billing2.example.com"))
        .await?;
    assert!(updated);

    let stored = db.get_service(id).await?.expect("service should exist");
    assert_eq!(stored.name, "Billing v2");
    assert_eq!(stored.url, "https://billing2.example.com");
    // Editing a service keeps the last probed expiry.
    assert_eq!(stored.certificate_expiry, Some(date(2027, 3, 1)));

    assert!(db.delete_service(id).await?);
    assert!(db.get_service(id).await?.is_none());
    assert!(!db.delete_service(id).await?);
    Ok(())
}

#[tokio::test]
async fn duplicate_service_name_or_url_conflicts() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_service(&service("Billing", "https://billing.example.com"), None)
        .await?;

    let same_name = db
        .insert_service(&service("Billing", "https://other.example.com"), None)
        .await;
    assert!(matches!(same_name, Err(WatchError::Conflict(_))));

    let same_url = db
        .insert_service(&service("Other", "https://billing.example.com"), None)
        .await;
    assert!(matches!(same_url, Err(WatchError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn update_missing_rows_reports_false() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;

    assert!(!db.update_service(42, &service("x", "https://x.example.com")).await?);
    assert!(!db.set_certificate_expiry(42, Some(date(2027, 1, 1))).await?);

    // The job-facing write reports a row deleted after the snapshot.
    assert!(!db.update_service_expiry(42, Some(date(2027, 1, 1))).await?);
    Ok(())
}

#[tokio::test]
async fn certificate_expiry_can_be_cleared() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;
    let id = db
        .insert_service(
            &service("Billing", "https://billing.example.com"),
            Some(date(2027, 3, 1)),
        )
        .await?;

    assert!(db.update_service_expiry(id, None).await?);
    let stored = db.get_service(id).await?.expect("service should exist");
    assert_eq!(stored.certificate_expiry, None);
    Ok(())
}

#[tokio::test]
async fn snapshots_are_in_insertion_order() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;
    for (name, url) in [
        ("C", "https://c.example.com"),
        ("A", "https://a.example.com"),
        ("B", "https://b.example.com"),
    ] {
        db.insert_service(&service(name, url), None).await?;
    }

    let names: Vec<String> = db
        .list_services()
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["C", "A", "B"]);
    Ok(())
}

#[tokio::test]
async fn license_crud_round_trip() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;

    let id = db
        .insert_license(&NewLicense {
            name: "ProLicense".to_string(),
            expiry_date: date(2026, 10, 21),
            alert_email: "not validated at this layer".to_string(),
        })
        .await?;

    let stored = db.get_license(id).await?.expect("license should exist");
    assert_eq!(stored.expiry_date, date(2026, 10, 21));
    assert_eq!(stored.alert_email, "not validated at this layer");

    assert!(
        db.update_license(
            id,
            &NewLicense {
                name: "ProLicense".to_string(),
                expiry_date: date(2027, 10, 21),
                alert_email: "ops@example.com".to_string(),
            },
        )
        .await?
    );

    let licenses = db.list_licenses().await?;
    assert_eq!(licenses.len(), 1);
    assert_eq!(licenses[0].expiry_date, date(2027, 10, 21));

    assert!(db.delete_license(id).await?);
    assert!(db.list_licenses().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_usernames_conflict() -> WatchResult<()> {
    let db = setup_in_memory_db().await?;

    db.insert_user("alice", "$argon2id$fake").await?;
    let again = db.insert_user("alice", "$argon2id$other").await;
    assert!(matches!(again, Err(WatchError::Conflict(_))));

    let user = db.get_user("alice").await?.expect("user should exist");
    assert_eq!(user.password_hash, "$argon2id$fake");
    assert!(db.get_user("bob").await?.is_none());
    Ok(())
}
