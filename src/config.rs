//! Configuration management for taskdue.
//!
//! Configuration can be set via environment variables:
//! - `SENDGRID_API_KEY` - Required. API key for outbound reminder mail.
//! - `JWT_SECRET` - Required. Secret for signing login tokens.
//! - `MAIL_FROM` - Optional. Sender address for reminder mail. Defaults to `reminders@taskdue.local`.
//! - `DATABASE_PATH` - Optional. SQLite database file. Defaults to `taskdue.db`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `JWT_TTL_DAYS` - Optional. Login token lifetime. Defaults to `30`.
//! - `REMINDER_INTERVAL_SECS` - Optional. Scheduler tick interval. Defaults to `600` (10 minutes).
//! - `REMINDER_WINDOW_SECS` - Optional. Due-date lookahead window. Defaults to `3600` (1 hour).
//! - `NOTIFY_TIMEOUT_SECS` - Optional. Outbound mail timeout. Defaults to `10`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Seconds between scheduler ticks
    pub interval_secs: u64,

    /// Lookahead window in seconds; tasks due within it are eligible
    pub window_secs: u64,

    /// Timeout for a single outbound mail call
    pub notify_timeout_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            window_secs: 3600,
            notify_timeout_secs: 10,
        }
    }
}

/// Auth configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing JWTs
    pub jwt_secret: String,

    /// Token lifetime in days
    pub jwt_ttl_days: i64,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// SendGrid API key for outbound mail
    pub sendgrid_api_key: String,

    /// Sender address for reminder mail
    pub mail_from: String,

    /// Auth configuration
    pub auth: AuthConfig,

    /// Reminder scheduler configuration
    pub reminder: ReminderConfig,
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `SENDGRID_API_KEY` or
    /// `JWT_SECRET` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sendgrid_api_key = std::env::var("SENDGRID_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("SENDGRID_API_KEY".to_string()))?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

        let mail_from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "reminders@taskdue.local".to_string());

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("taskdue.db"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let jwt_ttl_days = std::env::var("JWT_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("JWT_TTL_DAYS".to_string(), format!("{}", e)))?;

        let defaults = ReminderConfig::default();
        let reminder = ReminderConfig {
            interval_secs: env_u64("REMINDER_INTERVAL_SECS", defaults.interval_secs)?,
            window_secs: env_u64("REMINDER_WINDOW_SECS", defaults.window_secs)?,
            notify_timeout_secs: env_u64("NOTIFY_TIMEOUT_SECS", defaults.notify_timeout_secs)?,
        };

        Ok(Self {
            host,
            port,
            database_path,
            sendgrid_api_key,
            mail_from,
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days,
            },
            reminder,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(sendgrid_api_key: String, jwt_secret: String, database_path: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path,
            sendgrid_api_key,
            mail_from: "reminders@taskdue.local".to_string(),
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days: 30,
            },
            reminder: ReminderConfig::default(),
        }
    }
}
