use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use expiry_watch::config::AppConfig;
use expiry_watch::database::Database;
use expiry_watch::errors::{WatchError, WatchResult};
use expiry_watch::jobs::ExpiryScheduler;
use expiry_watch::logging::init_logging;
use expiry_watch::notify::SmtpNotifier;
use expiry_watch::probe::TlsProber;
use expiry_watch::server::{build_router, AppState, AuthState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("expiry watch stopped: {e}");
        eprintln!("expiry watch stopped: {e}");
        std::process::exit(1);
    }
}

async fn run() -> WatchResult<()> {
    // An optional first argument names the config file.
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => AppConfig::load_from(&path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;
    info!("Starting expiry watch ({})", env!("CARGO_PKG_VERSION"));

    let db = Database::new(&config.database).await?;
    db.migrate().await?;

    let prober = Arc::new(TlsProber::new(&config.probe)?);
    let notifier = Arc::new(SmtpNotifier::new(&config.mail)?);

    let mut scheduler = ExpiryScheduler::new(db.clone(), prober.clone(), notifier, config.alerts)
        .await
        .map_err(|e| WatchError::ServerError(e.to_string()))?;
    scheduler
        .start()
        .await
        .map_err(|e| WatchError::ServerError(e.to_string()))?;

    let state = AppState {
        db,
        prober,
        auth: AuthState::from_config(&config.auth)?,
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| WatchError::ConfigError(format!("invalid server address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WatchError::ServerError(format!("failed to bind {addr}: {e}")))?;

    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WatchError::ServerError(format!("server error: {e}")))?;

    scheduler
        .shutdown()
        .await
        .map_err(|e| WatchError::ServerError(e.to_string()))?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
