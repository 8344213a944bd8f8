//! Configuration system for Expiry Watch.
//!
//! Configuration is loaded once at startup from multiple sources with the
//! following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file (or an explicit path)
//! 3. Default values (lowest priority)
//!
//! The resulting [`AppConfig`] is immutable. Components receive the parts
//! they need through their constructors; nothing reads configuration from
//! ambient state at call time.
//!
//! # Environment Variables
//!
//! - `EXPIRY_WATCH_SERVER_HOST` / `EXPIRY_WATCH_SERVER_PORT` - HTTP bind address
//! - `EXPIRY_WATCH_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `EXPIRY_WATCH_DATABASE_URL` - Database connection URL
//! - `EXPIRY_WATCH_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `EXPIRY_WATCH_LOG_FILE` - Log file path (empty disables the file sink)
//! - `EXPIRY_WATCH_MAIL_SENDER` / `EXPIRY_WATCH_MAIL_PASSWORD` - Relay credentials
//! - `EXPIRY_WATCH_SMTP_SERVER` / `EXPIRY_WATCH_SMTP_PORT` - Relay address
//! - `EXPIRY_WATCH_SMTP_SECURITY` - `implicit` (SMTPS) or `starttls`
//! - `EXPIRY_WATCH_PROBE_TIMEOUT_SECS` - Certificate probe timeout
//! - `EXPIRY_WATCH_CERT_ALERT_DAYS_BEFORE` - Certificate alert threshold
//! - `EXPIRY_WATCH_LICENSE_ALERT_DAYS_BEFORE` - License alert threshold
//! - `EXPIRY_WATCH_CERT_CHECK_TIME` - Daily certificate refresh time (HH:MM, UTC)
//! - `EXPIRY_WATCH_ALERT_SEND_TIME` - Daily alert dispatch time (HH:MM, UTC)
//! - `EXPIRY_WATCH_AUTH_ENABLED` / `EXPIRY_WATCH_JWT_SECRET` - JWT authentication

use config::{Config, ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{WatchError, WatchResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Mail relay configuration
    pub mail: MailConfig,
    /// Certificate probe configuration
    pub probe: ProbeConfig,
    /// Alert windows and trigger times
    pub alerts: AlertConfig,
    /// JWT authentication configuration
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://monitor.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/expiry_watch".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Optional log file, appended to alongside stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("logs/expiry_watch.log".to_string()),
        }
    }
}

/// How the mail relay session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS, usually port 465)
    #[serde(rename = "implicit")]
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    #[serde(rename = "starttls")]
    StartTls,
}

/// Mail relay configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Sender address, also used as the login name
    pub sender: String,
    /// Relay password (use `env:VAR_NAME` to read from environment)
    pub password: String,
    /// Relay hostname
    pub smtp_server: String,
    /// Relay port
    pub smtp_port: u16,
    /// Implicit TLS or STARTTLS
    pub security: SmtpSecurity,
    /// Timeout for one relay session in seconds
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: "notify@example.com".to_string(),
            password: String::new(),
            smtp_server: "mail.example.com".to_string(),
            smtp_port: 465,
            security: SmtpSecurity::Implicit,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("sender", &self.sender)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Certificate probe configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Bound on TCP connect plus TLS handshake, in seconds
    pub timeout_secs: u64,
    /// Port probed on every monitored host
    pub port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            port: 443,
        }
    }
}

/// A daily wall-clock trigger, `HH:MM` in 24-hour UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TriggerTime {
    pub hour: u8,
    pub minute: u8,
}

impl TriggerTime {
    pub fn new(hour: u8, minute: u8) -> WatchResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(WatchError::ConfigError(format!(
                "trigger time {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Six-field cron expression firing once a day at this time.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

impl FromStr for TriggerTime {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || WatchError::ConfigError(format!("invalid trigger time '{s}', expected HH:MM"));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;

        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TriggerTime {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Alert threshold for one resource kind plus the time of day its job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AlertWindow {
    pub threshold_days: u32,
    pub check_time: TriggerTime,
}

impl AlertWindow {
    /// Whether a record that expires in `days_until_expiry` days is due an alert.
    ///
    /// The window is inclusive on both ends: `[0, threshold_days]`.
    /// Already-expired records (negative days) are never inside it.
    pub fn contains(&self, days_until_expiry: i64) -> bool {
        (0..=i64::from(self.threshold_days)).contains(&days_until_expiry)
    }
}

/// Alert windows for both resource kinds.
///
/// `certificate.check_time` triggers the expiry refresh job and
/// `license.check_time` triggers the alert dispatch job, which scans both
/// licenses and certificates.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub certificate: AlertWindow,
    pub license: AlertWindow,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            certificate: AlertWindow {
                threshold_days: 7,
                check_time: TriggerTime { hour: 9, minute: 0 },
            },
            license: AlertWindow {
                threshold_days: 10,
                check_time: TriggerTime {
                    hour: 14,
                    minute: 46,
                },
            },
        }
    }
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a bearer token on the CRUD routes
    pub enabled: bool,
    /// JWT secret key (use `env:VAR_NAME` to read from environment)
    pub jwt_secret: String,
    /// JWT issuer claim (iss)
    pub jwt_issuer: String,
    /// JWT audience claim (aud)
    pub jwt_audience: String,
    /// Token lifetime in seconds (default: 24 hours)
    pub token_expiration_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: String::new(),
            jwt_issuer: "expiry-watch".to_string(),
            jwt_audience: "expiry-watch-api".to_string(),
            token_expiration_secs: 86_400,
        }
    }
}

fn config_err(e: ConfigError) -> WatchError {
    WatchError::ConfigError(e.to_string())
}

fn env_i64(name: &str) -> Option<i64> {
    env::var(name).ok().and_then(|v| v.parse::<i64>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| v.parse::<bool>().ok())
}

impl AppConfig {
    /// Load configuration from `config.toml` (if present) and environment.
    pub fn load() -> WatchResult<Self> {
        let builder = Self::with_defaults()?
            .add_source(config::File::with_name("config").required(false));
        Self::finish(builder)
    }

    /// Load configuration from an explicit file and environment.
    pub fn load_from(path: &Path) -> WatchResult<Self> {
        let builder = Self::with_defaults()?.add_source(config::File::from(path).required(true));
        Self::finish(builder)
    }

    fn with_defaults() -> WatchResult<ConfigBuilder<config::builder::DefaultState>> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")
            .map_err(config_err)?
            .set_default("server.port", 8080)
            .map_err(config_err)?
            .set_default("database.db_type", "sqlite")
            .map_err(config_err)?
            .set_default("database.sqlite_url", "sqlite://monitor.db?mode=rwc")
            .map_err(config_err)?
            .set_default("database.postgres_url", "postgres://localhost/expiry_watch")
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .set_default("logging.file", "logs/expiry_watch.log")
            .map_err(config_err)?
            .set_default("mail.sender", "notify@example.com")
            .map_err(config_err)?
            .set_default("mail.password", "")
            .map_err(config_err)?
            .set_default("mail.smtp_server", "mail.example.com")
            .map_err(config_err)?
            .set_default("mail.smtp_port", 465)
            .map_err(config_err)?
            .set_default("mail.security", "implicit")
            .map_err(config_err)?
            .set_default("mail.timeout_secs", 30)
            .map_err(config_err)?
            .set_default("probe.timeout_secs", 10)
            .map_err(config_err)?
            .set_default("probe.port", 443)
            .map_err(config_err)?
            .set_default("alerts.certificate.threshold_days", 7)
            .map_err(config_err)?
            .set_default("alerts.certificate.check_time", "09:00")
            .map_err(config_err)?
            .set_default("alerts.license.threshold_days", 10)
            .map_err(config_err)?
            .set_default("alerts.license.check_time", "14:46")
            .map_err(config_err)?
            .set_default("auth.enabled", false)
            .map_err(config_err)?
            .set_default("auth.jwt_secret", "")
            .map_err(config_err)?
            .set_default("auth.jwt_issuer", "expiry-watch")
            .map_err(config_err)?
            .set_default("auth.jwt_audience", "expiry-watch-api")
            .map_err(config_err)?
            .set_default("auth.token_expiration_secs", 86_400)
            .map_err(config_err)
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> WatchResult<Self> {
        let settings = builder
            .set_override_option("server.host", env::var("EXPIRY_WATCH_SERVER_HOST").ok())
            .map_err(config_err)?
            .set_override_option("server.port", env_i64("EXPIRY_WATCH_SERVER_PORT"))
            .map_err(config_err)?
            .set_override_option("database.db_type", env::var("EXPIRY_WATCH_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("EXPIRY_WATCH_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("EXPIRY_WATCH_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("EXPIRY_WATCH_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option("logging.file", env::var("EXPIRY_WATCH_LOG_FILE").ok())
            .map_err(config_err)?
            .set_override_option("mail.sender", env::var("EXPIRY_WATCH_MAIL_SENDER").ok())
            .map_err(config_err)?
            .set_override_option("mail.password", env::var("EXPIRY_WATCH_MAIL_PASSWORD").ok())
            .map_err(config_err)?
            .set_override_option("mail.smtp_server", env::var("EXPIRY_WATCH_SMTP_SERVER").ok())
            .map_err(config_err)?
            .set_override_option("mail.smtp_port", env_i64("EXPIRY_WATCH_SMTP_PORT"))
            .map_err(config_err)?
            .set_override_option("mail.security", env::var("EXPIRY_WATCH_SMTP_SECURITY").ok())
            .map_err(config_err)?
            .set_override_option(
                "probe.timeout_secs",
                env_i64("EXPIRY_WATCH_PROBE_TIMEOUT_SECS"),
            )
            .map_err(config_err)?
            .set_override_option(
                "alerts.certificate.threshold_days",
                env_i64("EXPIRY_WATCH_CERT_ALERT_DAYS_BEFORE"),
            )
            .map_err(config_err)?
            .set_override_option(
                "alerts.license.threshold_days",
                env_i64("EXPIRY_WATCH_LICENSE_ALERT_DAYS_BEFORE"),
            )
            .map_err(config_err)?
            .set_override_option(
                "alerts.certificate.check_time",
                env::var("EXPIRY_WATCH_CERT_CHECK_TIME").ok(),
            )
            .map_err(config_err)?
            .set_override_option(
                "alerts.license.check_time",
                env::var("EXPIRY_WATCH_ALERT_SEND_TIME").ok(),
            )
            .map_err(config_err)?
            .set_override_option("auth.enabled", env_bool("EXPIRY_WATCH_AUTH_ENABLED"))
            .map_err(config_err)?
            .set_override_option("auth.jwt_secret", env::var("EXPIRY_WATCH_JWT_SECRET").ok())
            .map_err(config_err)?
            .build()
            .map_err(|e| WatchError::ConfigError(format!("failed to build config: {e}")))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| WatchError::ConfigError(format!("failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> WatchResult<()> {
        if self.server.port == 0 {
            return Err(WatchError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(WatchError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(WatchError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.mail.sender.trim().is_empty() {
            return Err(WatchError::ConfigError(
                "mail.sender cannot be empty".to_string(),
            ));
        }
        if self.mail.smtp_server.trim().is_empty() {
            return Err(WatchError::ConfigError(
                "mail.smtp_server cannot be empty".to_string(),
            ));
        }
        if self.mail.smtp_port == 0 {
            return Err(WatchError::ConfigError(
                "mail.smtp_port must be greater than 0".to_string(),
            ));
        }

        if self.probe.timeout_secs == 0 {
            return Err(WatchError::ConfigError(
                "probe.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.probe.port == 0 {
            return Err(WatchError::ConfigError(
                "probe.port must be greater than 0".to_string(),
            ));
        }

        if self.auth.enabled && self.auth.jwt_secret.is_empty() {
            return Err(WatchError::ConfigError(
                "auth.jwt_secret is required when auth.enabled is true".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolve a secret value, following an `env:VAR_NAME` indirection.
pub fn resolve_secret(value: &str) -> WatchResult<String> {
    match value.strip_prefix("env:") {
        Some(var) => env::var(var).map_err(|_| {
            WatchError::ConfigError(format!("environment variable '{var}' not found"))
        }),
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_time_parses_hh_mm() {
        let t: TriggerTime = "09:05".parse().unwrap();
        assert_eq!(t, TriggerTime { hour: 9, minute: 5 });
        assert_eq!(t.to_string(), "09:05");

        let t: TriggerTime = "7:30".parse().unwrap();
        assert_eq!(t.hour, 7);
        assert_eq!(t.minute, 30);
    }

    #[test]
    fn trigger_time_rejects_garbage() {
        assert!("24:00".parse::<TriggerTime>().is_err());
        assert!("12:60".parse::<TriggerTime>().is_err());
        assert!("noon".parse::<TriggerTime>().is_err());
        assert!("12".parse::<TriggerTime>().is_err());
        assert!("-1:30".parse::<TriggerTime>().is_err());
    }

    #[test]
    fn trigger_time_cron_expression_fires_daily() {
        let t = TriggerTime::new(14, 46).unwrap();
        assert_eq!(t.cron_expression(), "0 46 14 * * *");
    }

    #[test]
    fn alert_window_is_inclusive() {
        let window = AlertWindow {
            threshold_days: 10,
            check_time: TriggerTime::new(0, 0).unwrap(),
        };

        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(window.contains(10));
        assert!(!window.contains(11));
        assert!(!window.contains(-1));
    }

    #[test]
    fn zero_threshold_only_matches_expiry_day() {
        let window = AlertWindow {
            threshold_days: 0,
            check_time: TriggerTime::new(0, 0).unwrap(),
        };

        assert!(window.contains(0));
        assert!(!window.contains(1));
        assert!(!window.contains(-1));
    }

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.alerts.certificate.threshold_days, 7);
        assert_eq!(config.alerts.license.threshold_days, 10);
        assert_eq!(config.alerts.certificate.check_time.to_string(), "09:00");
        assert_eq!(config.alerts.license.check_time.to_string(), "14:46");
        assert_eq!(config.probe.timeout_secs, 10);
        assert_eq!(config.probe.port, 443);
        assert_eq!(config.mail.security, SmtpSecurity::Implicit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_auth_without_secret() {
        let mut config = AppConfig::default();
        config.auth.enabled = true;
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_database() {
        let mut config = AppConfig::default();
        config.database.db_type = "mysql".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn mail_password_is_not_debug_printed() {
        let mut config = MailConfig::default();
        config.password = "hunter2".to_string();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn resolve_secret_passes_literals_through() {
        assert_eq!(resolve_secret("plain").unwrap(), "plain");
        assert!(resolve_secret("env:EXPIRY_WATCH_TEST_SURELY_UNSET_VAR").is_err());
    }
}
