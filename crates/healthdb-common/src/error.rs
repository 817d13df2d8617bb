//! Error types shared across HealthDB crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by shared configuration and IO helpers
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

impl Error {
    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an error for an environment variable that failed to parse
    pub fn invalid_env(name: &str, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            name: name.to_string(),
            value: value.into(),
        }
    }
}
