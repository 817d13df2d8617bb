//! Post-processing of an ingested store
//!
//! Runs after export ingestion and may be re-run at any time:
//!
//! 1. rebuild `source_aliases` from every distinct source name
//! 2. (re)create the normalized views
//! 3. import workout routes, then ECG recordings, from their directories
//!
//! A missing auxiliary directory contributes nothing; it is not an error.

use crate::config::PostprocessOptions;
use crate::db::schema;
use crate::ecg::EcgIngester;
use crate::error::Result;
use crate::normalize::{create_views, rebuild_source_aliases};
use crate::routes::RouteIngester;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

/// Outcome of one post-process run
#[derive(Debug, Clone, Serialize)]
pub struct PostprocessSummary {
    /// Rows now in `source_aliases`
    pub aliases: u64,
    pub routes_added: u64,
    pub ecgs_added: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PostprocessSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

pub async fn postprocess(pool: &SqlitePool, options: &PostprocessOptions) -> Result<PostprocessSummary> {
    options.validate()?;
    let started_at = Utc::now();

    // Views select from the base tables, so they must exist even for an empty store
    schema::create_base_tables(pool).await?;
    schema::create_aux_tables(pool).await?;

    let aliases = rebuild_source_aliases(pool).await?;
    create_views(pool).await?;

    let routes_added = match &options.routes_dir {
        Some(dir) => RouteIngester::new(pool, options).ingest_dir(dir).await?,
        None => {
            info!("Route import disabled");
            0
        },
    };

    let ecgs_added = match &options.ecg_dir {
        Some(dir) => EcgIngester::new(pool, options).ingest_dir(dir).await?,
        None => {
            info!("ECG import disabled");
            0
        },
    };

    let summary = PostprocessSummary {
        aliases,
        routes_added,
        ecgs_added,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        aliases,
        routes_added,
        ecgs_added,
        duration_ms = summary.duration().num_milliseconds(),
        "Post-processing complete"
    );

    Ok(summary)
}
