//! Store configuration
//!
//! The store is a single SQLite file. Its location comes from the
//! environment (optionally seeded from a `.env` file) and can be
//! overridden by command-line flags.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default SQLite database path.
pub const DEFAULT_STORE_PATH: &str = "health.sqlite";

/// Default time to wait on a locked database before failing, in seconds.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

/// Location and connection settings of the SQLite store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file (created if missing)
    pub path: PathBuf,

    /// How long a statement waits on a locked database
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
        }
    }
}

impl StoreConfig {
    /// Store at the given path with default settings
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HEALTHDB_DATABASE`: SQLite database path
    /// - `HEALTHDB_BUSY_TIMEOUT_SECS`: lock wait in seconds
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(path) = std::env::var("HEALTHDB_DATABASE") {
            config.path = PathBuf::from(path);
        }

        if let Some(secs) = env_parse("HEALTHDB_BUSY_TIMEOUT_SECS")? {
            config.busy_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::config("Store path cannot be empty"));
        }

        Ok(())
    }
}

/// Read and parse an optional environment variable
///
/// Returns `Ok(None)` when the variable is unset and an error when it is set
/// to something that does not parse.
pub fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_env(name, raw)),
        Err(_) => Ok(None),
    }
}
