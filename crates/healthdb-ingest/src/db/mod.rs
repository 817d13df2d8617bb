//! SQLite store access
//!
//! The store is opened with exactly one pooled connection: ingestion is a
//! single-writer, strictly sequential process, and every flush is its own
//! committed transaction.

pub mod bulk;
pub mod schema;

use crate::error::Result;
use healthdb_common::config::StoreConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;
use tracing::info;

pub use bulk::{insert_rows, insert_with_children, ChildRow, TableRow};

/// Open (creating if needed) the SQLite store
///
/// Uses a write-ahead log with `synchronous=NORMAL`: a crash loses at most the
/// transaction in flight, never a committed batch.
pub async fn open_store(config: &StoreConfig) -> Result<SqlitePool> {
    config.validate()?;

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
        .pragma("temp_store", "MEMORY");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    info!(path = %config.path.display(), "Opened health store");

    Ok(pool)
}

/// Whether a table exists in the store
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Next free id for a table: `max(id) + 1`, or 1 when the table is empty or absent
pub async fn next_id(pool: &SqlitePool, table: &str) -> Result<i64> {
    if !table_exists(pool, table).await? {
        return Ok(1);
    }

    let max: Option<i64> = sqlx::query_scalar(&format!("SELECT MAX(id) FROM {}", table))
        .fetch_one(pool)
        .await?;

    Ok(max.map_or(1, |id| id + 1))
}

/// Dense id sequence for one table
///
/// Seeded from the store's current maximum and carried explicitly through a
/// run. Correct only while a single writer owns the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSequence {
    next: i64,
}

impl IdSequence {
    /// Sequence starting at `next`
    pub fn starting_at(next: i64) -> Self {
        Self { next }
    }

    /// Sequence continuing after the highest id already in `table`
    pub async fn seed(pool: &SqlitePool, table: &str) -> Result<Self> {
        Ok(Self::starting_at(next_id(pool, table).await?))
    }

    /// Hand out the next id
    pub fn advance(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `advance` returns
    pub fn peek(&self) -> i64 {
        self.next
    }
}
