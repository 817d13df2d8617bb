//! Path-based idempotency for auxiliary files
//!
//! A file counts as ingested when its path string is already stored. Content
//! is never inspected: a rewritten file at the same path stays skipped, and a
//! moved file is new.

use crate::db::table_exists;
use crate::error::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What happened to one auxiliary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Ingested,
    /// Path already stored, skipped before parsing
    AlreadyIngested,
    /// Parsed but nothing usable in it
    Empty,
    /// Lost a uniqueness race on `file_path`; the stored version wins
    Duplicate,
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileOutcome::Ingested => "ingested",
            FileOutcome::AlreadyIngested => "already ingested",
            FileOutcome::Empty => "empty",
            FileOutcome::Duplicate => "duplicate path",
        };
        f.write_str(label)
    }
}

impl FileOutcome {
    pub fn log(self, path: &str) {
        match self {
            FileOutcome::Ingested => debug!(path, outcome = %self, "Auxiliary file"),
            _ => info!(path, outcome = %self, "Auxiliary file skipped"),
        }
    }
}

/// Stored path of a file found in `dir`
pub fn stored_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Paths already present in a table's `file_path` column
#[derive(Debug, Clone, Default)]
pub struct IngestedPaths {
    paths: HashSet<String>,
}

impl IngestedPaths {
    /// Nothing counts as ingested
    pub fn none() -> Self {
        Self::default()
    }

    /// Load every stored path; a missing table means none
    pub async fn load(pool: &SqlitePool, table: &str) -> Result<Self> {
        if !table_exists(pool, table).await? {
            return Ok(Self::none());
        }

        let paths: Vec<Option<String>> =
            sqlx::query_scalar(&format!("SELECT file_path FROM {}", table))
                .fetch_all(pool)
                .await?;

        Ok(Self {
            paths: paths.into_iter().flatten().collect(),
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Files in `dir` with the given extension (any case), sorted by file name
///
/// Each path is `dir` joined with the file name. A missing directory yields
/// an empty list.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        info!(dir = %dir.display(), "Directory not found, nothing to import");
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let matches = Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

        if matches && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Discovered files minus those already ingested
pub fn pending_files(
    dir: &Path,
    extension: &str,
    ingested: &IngestedPaths,
) -> Result<Vec<PathBuf>> {
    let files = discover_files(dir, extension)?;
    let total = files.len();

    let pending: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            let stored = stored_path(path);
            let seen = ingested.contains(&stored);
            if seen {
                FileOutcome::AlreadyIngested.log(&stored);
            }
            !seen
        })
        .collect();

    debug!(
        dir = %dir.display(),
        found = total,
        pending = pending.len(),
        "Scanned auxiliary directory"
    );

    Ok(pending)
}
