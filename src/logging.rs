//! Process-wide tracing setup.
//!
//! Events go to stdout and, when `logging.file` is set, are appended to
//! that file as well. `RUST_LOG` takes precedence over the configured level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{WatchError, WatchResult};

/// Open (creating parent directories as needed) a log file in append mode.
pub fn open_log_file(path: &Path) -> WatchResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            WatchError::ConfigError(format!("cannot create log directory {}: {e}", parent.display()))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WatchError::ConfigError(format!("cannot open log file {}: {e}", path.display())))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> WatchResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .map_err(|e| WatchError::ConfigError(format!("invalid log level: {e}")))?;

    let file_layer = match config.file.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(path) => {
            let file = open_log_file(Path::new(path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| WatchError::ConfigError(format!("logging already initialised: {e}")))
}
