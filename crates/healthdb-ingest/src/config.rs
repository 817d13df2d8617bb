//! Run options for the two pipeline stages

use crate::error::{IngestError, Result};
use healthdb_common::config::env_parse;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

/// Default number of buffered rows in one table that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default directory of GPX route files.
pub const DEFAULT_ROUTES_DIR: &str = "workout-routes";

/// Default directory of ECG CSV files.
pub const DEFAULT_ECG_DIR: &str = "electrocardiograms";

/// Default number of buffered points or samples that triggers a flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 20_000;

/// Options of an export ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Rows buffered in any one table before a batch is committed
    pub batch_size: usize,

    /// Store `MetadataEntry` children of records
    pub capture_metadata: bool,

    /// Stop after this many entities; the store is then partial
    pub max_elements: Option<u64>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            capture_metadata: false,
            max_elements: None,
        }
    }
}

impl IngestOptions {
    /// Load options from environment variables
    ///
    /// Environment variables:
    /// - `HEALTHDB_BATCH_SIZE`
    /// - `HEALTHDB_WITH_METADATA`: true or false
    /// - `HEALTHDB_MAX_ELEMENTS`
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Some(batch_size) = env_parse("HEALTHDB_BATCH_SIZE")? {
            options.batch_size = batch_size;
        }
        if let Some(capture) = env_parse("HEALTHDB_WITH_METADATA")? {
            options.capture_metadata = capture;
        }
        if let Some(max) = env_parse("HEALTHDB_MAX_ELEMENTS")? {
            options.max_elements = Some(max);
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::config("Batch size must be greater than 0"));
        }
        Ok(())
    }

    pub fn builder() -> IngestOptionsBuilder {
        IngestOptionsBuilder::default()
    }
}

/// Builder for IngestOptions
#[derive(Default)]
pub struct IngestOptionsBuilder {
    options: IngestOptions,
}

impl IngestOptionsBuilder {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn capture_metadata(mut self, capture: bool) -> Self {
        self.options.capture_metadata = capture;
        self
    }

    pub fn max_elements(mut self, max: Option<u64>) -> Self {
        self.options.max_elements = max;
        self
    }

    pub fn build(self) -> IngestOptions {
        self.options
    }
}

/// Options of a post-process run
///
/// A stage whose directory is `None` is switched off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostprocessOptions {
    pub routes_dir: Option<PathBuf>,
    pub ecg_dir: Option<PathBuf>,

    /// Skip auxiliary files whose path is already stored
    pub skip_existing: bool,

    /// Buffered child rows (points, samples) that trigger a flush
    pub flush_threshold: usize,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            routes_dir: Some(PathBuf::from(DEFAULT_ROUTES_DIR)),
            ecg_dir: Some(PathBuf::from(DEFAULT_ECG_DIR)),
            skip_existing: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl PostprocessOptions {
    /// Load options from environment variables
    ///
    /// Environment variables:
    /// - `HEALTHDB_ROUTES_DIR`
    /// - `HEALTHDB_ECG_DIR`
    /// - `HEALTHDB_SKIP_EXISTING`: true or false
    /// - `HEALTHDB_FLUSH_THRESHOLD`
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(dir) = std::env::var("HEALTHDB_ROUTES_DIR") {
            options.routes_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("HEALTHDB_ECG_DIR") {
            options.ecg_dir = Some(PathBuf::from(dir));
        }
        if let Some(skip) = env_parse("HEALTHDB_SKIP_EXISTING")? {
            options.skip_existing = skip;
        }
        if let Some(threshold) = env_parse("HEALTHDB_FLUSH_THRESHOLD")? {
            options.flush_threshold = threshold;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(IngestError::config("Flush threshold must be greater than 0"));
        }
        Ok(())
    }

    pub fn builder() -> PostprocessOptionsBuilder {
        PostprocessOptionsBuilder::default()
    }
}

/// Builder for PostprocessOptions
#[derive(Default)]
pub struct PostprocessOptionsBuilder {
    options: PostprocessOptions,
}

impl PostprocessOptionsBuilder {
    pub fn routes_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.options.routes_dir = dir;
        self
    }

    pub fn ecg_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.options.ecg_dir = dir;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.options.skip_existing = skip;
        self
    }

    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.options.flush_threshold = threshold;
        self
    }

    pub fn build(self) -> PostprocessOptions {
        self.options
    }
}
