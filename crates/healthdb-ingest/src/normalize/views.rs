//! Read-only normalized views
//!
//! Consumers read through these views rather than the base tables. They add
//! the canonical source name, a numeric value (null when the text is not a
//! number) and timestamps cut to `YYYY-MM-DD HH:MM:SS`.
//!
//! Views are created only if absent. After changing a definition, call
//! [`drop_views`] first.

use crate::error::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Numeric reading of `records.value`
///
/// A bare `CAST` reads the numeric prefix of any text ("1-2" gives 1.0, "e5"
/// gives 0.0). Only a complete numeric literal is cast; anything else is NULL.
const VALUE_NUM: &str = r#"
    CASE
        WHEN r.value IS NULL OR NOT json_valid(trim(r.value)) THEN NULL
        WHEN json_type(trim(r.value)) IN ('integer', 'real') THEN CAST(trim(r.value) AS REAL)
    END"#;

pub const VIEW_NAMES: &[&str] = &["records_norm", "workouts_norm", "correlations_norm"];

fn view_definitions() -> [String; 3] {
    [
        format!(
            r#"
            CREATE VIEW IF NOT EXISTS records_norm AS
            SELECT
                r.*,
                sa.normalized_source AS source_name_norm,
                {VALUE_NUM} AS value_num,
                substr(r.start_date, 1, 19) AS start_dt,
                substr(r.end_date, 1, 19) AS end_dt
            FROM records r
            LEFT JOIN source_aliases sa ON r.source_name = sa.raw_source
            "#
        ),
        r#"
        CREATE VIEW IF NOT EXISTS workouts_norm AS
        SELECT
            w.*,
            sa.normalized_source AS source_name_norm,
            substr(w.start_date, 1, 19) AS start_dt,
            substr(w.end_date, 1, 19) AS end_dt
        FROM workouts w
        LEFT JOIN source_aliases sa ON w.source_name = sa.raw_source
        "#
        .to_string(),
        r#"
        CREATE VIEW IF NOT EXISTS correlations_norm AS
        SELECT
            c.*,
            sa.normalized_source AS source_name_norm,
            substr(c.start_date, 1, 19) AS start_dt,
            substr(c.end_date, 1, 19) AS end_dt
        FROM correlations c
        LEFT JOIN source_aliases sa ON c.source_name = sa.raw_source
        "#
        .to_string(),
    ]
}

/// Create the normalized views unless they already exist
///
/// The base tables and `source_aliases` must exist.
pub async fn create_views(pool: &SqlitePool) -> Result<()> {
    for definition in view_definitions() {
        sqlx::query(&definition).execute(pool).await?;
    }
    debug!(views = VIEW_NAMES.len(), "Normalized views ready");
    Ok(())
}

pub async fn drop_views(pool: &SqlitePool) -> Result<()> {
    for view in VIEW_NAMES {
        sqlx::query(&format!("DROP VIEW IF EXISTS {}", view))
            .execute(pool)
            .await?;
    }
    Ok(())
}
