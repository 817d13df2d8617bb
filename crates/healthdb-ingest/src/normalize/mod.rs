//! Source identity normalization
//!
//! Devices and apps report their names inconsistently: curly versus straight
//! apostrophes, non-breaking spaces, doubled whitespace. Every distinct raw
//! `source_name` is mapped to one canonical form in `source_aliases`, which
//! the normalized views join against.

pub mod views;

pub use views::{create_views, drop_views, VIEW_NAMES};

use crate::db::{schema, table_exists};
use crate::error::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Entity tables carrying a `source_name` column
pub const SOURCE_TABLES: &[&str] = &[
    "records",
    "workouts",
    "correlations",
    "clinical_records",
    "audiograms",
    "vision_prescriptions",
];

/// Canonical form of a raw source name
pub fn normalize_source_name(raw: &str) -> String {
    raw.replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct raw source names currently stored
pub async fn distinct_sources(pool: &SqlitePool) -> Result<BTreeSet<String>> {
    let mut sources = BTreeSet::new();

    for table in SOURCE_TABLES {
        if !table_exists(pool, table).await? {
            debug!(table, "Skipping absent table");
            continue;
        }

        let names: Vec<Option<String>> =
            sqlx::query_scalar(&format!("SELECT DISTINCT source_name FROM {}", table))
                .fetch_all(pool)
                .await?;
        sources.extend(names.into_iter().flatten());
    }

    Ok(sources)
}

/// Rebuild `source_aliases` from every raw source name in the store
///
/// The table is replaced wholesale in one transaction: a raw value that no
/// longer occurs anywhere loses its alias. Returns the number of aliases.
pub async fn rebuild_source_aliases(pool: &SqlitePool) -> Result<u64> {
    schema::create_aux_tables(pool).await?;
    let sources = distinct_sources(pool).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM source_aliases")
        .execute(&mut *tx)
        .await?;

    let rows: Vec<(String, String)> = sources
        .into_iter()
        .map(|raw| {
            let normalized = normalize_source_name(&raw);
            (raw, normalized)
        })
        .collect();

    // two bound parameters per alias
    for chunk in rows.chunks(crate::db::bulk::SQLITE_MAX_VARIABLES / 2) {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR REPLACE INTO source_aliases (raw_source, normalized_source) ",
        );
        query_builder.push_values(chunk, |mut b, (raw, normalized)| {
            b.push_bind(raw.clone()).push_bind(normalized.clone());
        });
        query_builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    schema::create_alias_indexes(pool).await?;

    let merged = rows.iter().filter(|(raw, normalized)| raw != normalized).count();
    info!(aliases = rows.len(), rewritten = merged, "Rebuilt source aliases");

    Ok(rows.len() as u64)
}
