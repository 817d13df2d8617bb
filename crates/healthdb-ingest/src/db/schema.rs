//! Fixed relational schema
//!
//! Base tables hold one row per exported entity. Auxiliary tables are owned by
//! the post-process stage. Every statement is idempotent (`IF NOT EXISTS`), so
//! creating the schema against an existing store is a no-op.

use crate::error::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Entity tables populated from the export, plus the metadata side-table
const BASE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY,
        type TEXT,
        unit TEXT,
        value TEXT,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workouts (
        id INTEGER PRIMARY KEY,
        workout_activity_type TEXT,
        duration REAL,
        duration_unit TEXT,
        total_energy_burned REAL,
        total_energy_burned_unit TEXT,
        total_distance REAL,
        total_distance_unit TEXT,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS correlations (
        id INTEGER PRIMARY KEY,
        type TEXT,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_summaries (
        id INTEGER PRIMARY KEY,
        date_components TEXT,
        active_energy_burned REAL,
        active_energy_burned_goal REAL,
        active_energy_burned_unit TEXT,
        apple_move_time REAL,
        apple_move_time_goal REAL,
        apple_exercise_time REAL,
        apple_exercise_time_goal REAL,
        apple_stand_hours REAL,
        apple_stand_hours_goal REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clinical_records (
        id INTEGER PRIMARY KEY,
        type TEXT,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT,
        display_name TEXT,
        extra_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audiograms (
        id INTEGER PRIMARY KEY,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT,
        extra_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vision_prescriptions (
        id INTEGER PRIMARY KEY,
        source_name TEXT,
        source_version TEXT,
        device TEXT,
        creation_date TEXT,
        start_date TEXT,
        end_date TEXT,
        extra_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS record_metadata (
        record_id INTEGER,
        key TEXT,
        value TEXT
    )
    "#,
];

/// Tables written by the post-process stage
const AUX_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS source_aliases (
        raw_source TEXT PRIMARY KEY,
        normalized_source TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workout_routes (
        id INTEGER PRIMARY KEY,
        file_path TEXT UNIQUE,
        start_time TEXT,
        end_time TEXT,
        point_count INTEGER,
        distance_km REAL,
        min_lat REAL,
        max_lat REAL,
        min_lon REAL,
        max_lon REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workout_route_points (
        route_id INTEGER,
        point_index INTEGER,
        lat REAL,
        lon REAL,
        ele REAL,
        time TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ecg_records (
        id INTEGER PRIMARY KEY,
        file_path TEXT UNIQUE,
        recorded_date TEXT,
        classification TEXT,
        symptoms TEXT,
        sample_rate_hz REAL,
        lead TEXT,
        unit TEXT,
        device TEXT,
        software_version TEXT,
        extra_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ecg_samples (
        ecg_id INTEGER,
        sample_index INTEGER,
        value REAL
    )
    "#,
];

const BASE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_type ON records(type)",
    "CREATE INDEX IF NOT EXISTS idx_records_start_date ON records(start_date)",
    "CREATE INDEX IF NOT EXISTS idx_records_source ON records(source_name)",
    "CREATE INDEX IF NOT EXISTS idx_workouts_type ON workouts(workout_activity_type)",
    "CREATE INDEX IF NOT EXISTS idx_workouts_start_date ON workouts(start_date)",
    "CREATE INDEX IF NOT EXISTS idx_workouts_source ON workouts(source_name)",
    "CREATE INDEX IF NOT EXISTS idx_correlations_type ON correlations(type)",
    "CREATE INDEX IF NOT EXISTS idx_correlations_start_date ON correlations(start_date)",
    "CREATE INDEX IF NOT EXISTS idx_correlations_source ON correlations(source_name)",
    "CREATE INDEX IF NOT EXISTS idx_record_metadata_record ON record_metadata(record_id)",
];

const ALIAS_INDEXES: &[&str] =
    &["CREATE INDEX IF NOT EXISTS idx_source_aliases_norm ON source_aliases(normalized_source)"];

const ROUTE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_workout_route_points_route ON workout_route_points(route_id)",
    "CREATE INDEX IF NOT EXISTS idx_workout_routes_start_time ON workout_routes(start_time)",
];

const ECG_INDEXES: &[&str] =
    &["CREATE INDEX IF NOT EXISTS idx_ecg_samples_ecg ON ecg_samples(ecg_id)"];

async fn execute_all(pool: &SqlitePool, statements: &[&str]) -> Result<()> {
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Create the entity tables and the metadata side-table
pub async fn create_base_tables(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, BASE_TABLES).await?;
    debug!(tables = BASE_TABLES.len(), "Base tables ready");
    Ok(())
}

/// Create the alias, route and ECG tables
pub async fn create_aux_tables(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, AUX_TABLES).await?;
    debug!(tables = AUX_TABLES.len(), "Auxiliary tables ready");
    Ok(())
}

/// Secondary indexes on the entity tables; run once bulk loading is done
pub async fn create_base_indexes(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, BASE_INDEXES).await
}

pub async fn create_alias_indexes(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, ALIAS_INDEXES).await
}

pub async fn create_route_indexes(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, ROUTE_INDEXES).await
}

pub async fn create_ecg_indexes(pool: &SqlitePool) -> Result<()> {
    execute_all(pool, ECG_INDEXES).await
}
