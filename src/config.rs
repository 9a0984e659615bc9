//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first if present.

use std::env;
use std::str::FromStr;

/// Which store implementation backs the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Hosted realtime database (or its emulator) over REST.
    Rtdb,
    /// In-process tree; data is lost on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rtdb" => Ok(StoreBackend::Rtdb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store implementation
    pub backend: StoreBackend,
    /// Database URL, e.g. https://my-project-default-rtdb.firebaseio.com
    pub database_url: String,
    /// Database secret or ID token, sent as the `auth` parameter
    pub database_auth: Option<String>,
    /// Database namespace used with the emulator
    pub database_namespace: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: "http://localhost:9000".to_string(),
            database_auth: None,
            database_namespace: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse::<StoreBackend>()?,
            Err(_) => StoreBackend::Rtdb,
        };

        // The emulator does not need a URL.
        let emulated = env::var(crate::db::rtdb::EMULATOR_HOST_ENV).is_ok();
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url.trim().to_string(),
            Err(_) if backend == StoreBackend::Memory || emulated => String::new(),
            Err(_) => return Err(ConfigError::Missing("DATABASE_URL")),
        };

        let port = match env::var("PORT") {
            Ok(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            backend,
            database_url,
            database_auth: env::var("DATABASE_AUTH")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
