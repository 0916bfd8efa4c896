//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Timing of the cloud sync scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncTiming {
    /// Quiet period after the last change before a push.
    pub debounce: Duration,
    /// Unconditional push period while a session is active.
    pub interval: Duration,
    /// Minimum gap between the end of one push and the start of the next.
    pub cooldown: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            interval: Duration::from_secs(30),
            cooldown: Duration::from_millis(1000),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Cloud sync is disabled when unset.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub cors_origin: String,
    pub sync: SyncTiming,
    /// Starts a session for this user at boot.
    pub player_id: Option<Uuid>,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load Sync Timing ---
        let defaults = SyncTiming::default();
        let sync = SyncTiming {
            debounce: Duration::from_millis(parse_var(
                "SYNC_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )?),
            interval: Duration::from_secs(parse_var(
                "SYNC_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            cooldown: Duration::from_millis(parse_var(
                "SYNC_COOLDOWN_MS",
                defaults.cooldown.as_millis() as u64,
            )?),
        };
        if sync.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SYNC_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let player_id = match std::env::var("PLAYER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Uuid::parse_str(raw.trim()).map_err(|e| {
                    ConfigError::InvalidValue("PLAYER_ID".to_string(), e.to_string())
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            data_dir,
            cors_origin,
            sync,
            player_id,
        })
    }
}
