//! Error types for the ingestion pipeline
//!
//! Only conditions that abort a run are errors. Permissive outcomes such as an
//! unparsable numeric attribute, a missing auxiliary directory, an auxiliary
//! file with nothing usable in it, or a file path that was already ingested
//! are handled in place and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that abort an ingestion or post-process run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Export file not found or unreadable: {}", path.display())]
    MissingInputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] healthdb_common::Error),
}

impl From<regex::Error> for IngestError {
    fn from(err: regex::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

impl IngestError {
    /// Create a parse error from a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit status for this error
    ///
    /// An unreadable export exits with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::MissingInputFile { .. } => 2,
            _ => 1,
        }
    }
}
