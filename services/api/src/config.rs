//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Identity and endpoint of the remote metadata store. Present only when
/// the user is signed in; authentication itself is handled by an external
/// identity provider that issues the access token.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub api_url: String,
    pub api_key: String,
    pub access_token: String,
    pub user_id: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub allowed_origin: String,
    /// Coalescing window for debounced progress saves.
    pub progress_debounce_ms: u64,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure
    /// tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let progress_debounce_ms = match std::env::var("PROGRESS_SAVE_DEBOUNCE_MS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue("PROGRESS_SAVE_DEBOUNCE_MS".to_string(), raw)
            })?,
            Err(_) => 3_000,
        };

        // The remote store is optional; when REMOTE_API_URL is set, the
        // rest of the identity must be complete.
        let remote = match std::env::var("REMOTE_API_URL") {
            Ok(api_url) => Some(RemoteConfig {
                api_url,
                api_key: require_var("REMOTE_API_KEY")?,
                access_token: require_var("REMOTE_ACCESS_TOKEN")?,
                user_id: require_var("REMOTE_USER_ID")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            bind_address,
            data_dir,
            log_level,
            allowed_origin,
            progress_debounce_ms,
            remote,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("flashread.db")
    }

    pub fn crash_buffer_path(&self) -> PathBuf {
        self.data_dir.join("crash_buffer.json")
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}
