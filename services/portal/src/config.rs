//! services/portal/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

use horoscope_core::session::SessionTimeouts;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    /// Upper bound on the initial session read during bootstrap.
    pub bootstrap_timeout: Duration,
    /// Upper bound on a profile fetch; kept below the bootstrap bound.
    pub profile_timeout: Duration,
    /// Lifetime of an issued auth session.
    pub session_ttl_days: i64,
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
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load Session Tuning (defaults match the original app) ---
        let bootstrap_timeout =
            Duration::from_millis(env_u64("BOOTSTRAP_TIMEOUT_MS", 8_000)?);
        let profile_timeout = Duration::from_millis(env_u64("PROFILE_TIMEOUT_MS", 5_000)?);
        let session_ttl_days = env_u64("SESSION_TTL_DAYS", 30)? as i64;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            bootstrap_timeout,
            profile_timeout,
            session_ttl_days,
        })
    }

    /// The timeout bundle handed to each session controller.
    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            bootstrap: self.bootstrap_timeout,
            profile: self.profile_timeout,
        }
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
