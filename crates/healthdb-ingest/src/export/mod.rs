//! Export ingestion
//!
//! Streams a health export into the base tables:
//!
//! 1. open the export (nothing is written if it cannot be read)
//! 2. create the base tables if needed
//! 3. extract entities one by one and hand them to the [`BatchWriter`]
//! 4. flush the remainder and build secondary indexes
//!
//! # Example
//!
//! ```no_run
//! use healthdb_common::config::StoreConfig;
//! use healthdb_ingest::{db, export, IngestOptions};
//! use std::path::Path;
//!
//! # async fn run() -> healthdb_ingest::Result<()> {
//! let pool = db::open_store(&StoreConfig::at("health.sqlite")).await?;
//! let summary = export::ingest(&pool, Path::new("export.xml"), &IngestOptions::default()).await?;
//! tracing::info!(records = summary.counts.records, "Loaded export");
//! # Ok(())
//! # }
//! ```

pub mod extractor;
pub mod models;
pub mod writer;

pub use extractor::ExportExtractor;
pub use models::{EntityKind, ExportEntity};
pub use writer::{BatchWriter, TableCounts};

use crate::config::IngestOptions;
use crate::db::schema;
use crate::error::Result;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::info;

/// How often the progress bar position is refreshed
const PROGRESS_INTERVAL: u64 = 1_000;

/// Outcome of one export ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub export: PathBuf,
    pub counts: TableCounts,
    /// Entities extracted; equals the cap when `max_elements` stopped the run
    pub elements: u64,
    pub batches: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Loads one export into a store
pub struct ExportIngester<'p> {
    pool: &'p SqlitePool,
    options: IngestOptions,
    progress: ProgressBar,
}

impl<'p> ExportIngester<'p> {
    pub fn new(pool: &'p SqlitePool, options: IngestOptions) -> Self {
        Self {
            pool,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report the running entity count on this bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub async fn ingest(&self, path: &Path) -> Result<IngestSummary> {
        self.options.validate()?;
        let started_at = Utc::now();

        let entities = ExportExtractor::open(path)?
            .with_metadata(self.options.capture_metadata)
            .with_limit(self.options.max_elements);

        info!(
            path = %path.display(),
            batch_size = self.options.batch_size,
            capture_metadata = self.options.capture_metadata,
            "Ingesting export"
        );

        schema::create_base_tables(self.pool).await?;
        let mut writer = BatchWriter::new(self.pool, self.options.batch_size).await?;

        let mut elements = 0u64;
        for entity in entities {
            writer.push(entity?).await?;
            elements += 1;

            if elements % PROGRESS_INTERVAL == 0 {
                self.progress.set_position(elements);
            }
        }

        let report = writer.finish().await?;
        self.progress.set_position(elements);

        schema::create_base_indexes(self.pool).await?;
        self.progress.finish_and_clear();

        if self.options.max_elements.is_some_and(|max| elements >= max) {
            info!(elements, "Stopped at element limit; store holds a partial export");
        }

        for (table, rows) in report.counts.by_table() {
            info!(table, rows, "Rows written");
        }

        let summary = IngestSummary {
            export: path.to_path_buf(),
            counts: report.counts,
            elements,
            batches: report.batches,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            elements,
            batches = summary.batches,
            duration_ms = summary.duration().num_milliseconds(),
            "Export ingestion complete"
        );

        Ok(summary)
    }
}

/// Ingest one export with a hidden progress bar
pub async fn ingest(pool: &SqlitePool, path: &Path, options: &IngestOptions) -> Result<IngestSummary> {
    ExportIngester::new(pool, options.clone()).ingest(path).await
}
