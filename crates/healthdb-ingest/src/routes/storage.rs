//! Route persistence

use super::{parse_gpx_file, RouteSummary, TrackPoint, ROUTE_EXTENSION};
use crate::config::PostprocessOptions;
use crate::db::{insert_with_children, schema, ChildRow, IdSequence, TableRow};
use crate::error::Result;
use crate::tracker::{pending_files, stored_path, FileOutcome, IngestedPaths};
use sqlx::query_builder::Separated;
use sqlx::{Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

const ROUTES_TABLE: &str = "workout_routes";

#[derive(Debug, Clone)]
struct RouteRow {
    id: i64,
    file_path: String,
    summary: RouteSummary,
}

impl TableRow for RouteRow {
    const TABLE: &'static str = ROUTES_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "file_path",
        "start_time",
        "end_time",
        "point_count",
        "distance_km",
        "min_lat",
        "max_lat",
        "min_lon",
        "max_lon",
    ];
    const INSERT: &'static str = "INSERT OR IGNORE";

    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        let summary = &self.summary;
        row.push_bind(self.id)
            .push_bind(self.file_path.clone())
            .push_bind(summary.start_time.clone())
            .push_bind(summary.end_time.clone())
            .push_bind(summary.point_count as i64)
            .push_bind(summary.distance_km)
            .push_bind(summary.bounds.min_lat)
            .push_bind(summary.bounds.max_lat)
            .push_bind(summary.bounds.min_lon)
            .push_bind(summary.bounds.max_lon);
    }
}

#[derive(Debug, Clone)]
struct RoutePointRow {
    route_id: i64,
    point_index: i64,
    point: TrackPoint,
}

impl TableRow for RoutePointRow {
    const TABLE: &'static str = "workout_route_points";
    const COLUMNS: &'static [&'static str] =
        &["route_id", "point_index", "lat", "lon", "ele", "time"];

    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.route_id)
            .push_bind(self.point_index)
            .push_bind(self.point.lat)
            .push_bind(self.point.lon)
            .push_bind(self.point.ele)
            .push_bind(self.point.time.clone());
    }
}

impl ChildRow for RoutePointRow {
    fn parent_id(&self) -> i64 {
        self.route_id
    }
}

/// Imports a directory of GPX files
pub struct RouteIngester<'p> {
    pool: &'p SqlitePool,
    skip_existing: bool,
    flush_threshold: usize,
}

impl<'p> RouteIngester<'p> {
    pub fn new(pool: &'p SqlitePool, options: &PostprocessOptions) -> Self {
        Self {
            pool,
            skip_existing: options.skip_existing,
            flush_threshold: options.flush_threshold.max(1),
        }
    }

    /// Import every pending route file; returns the number of routes added
    pub async fn ingest_dir(&self, dir: &Path) -> Result<u64> {
        schema::create_aux_tables(self.pool).await?;

        let ingested = if self.skip_existing {
            IngestedPaths::load(self.pool, ROUTES_TABLE).await?
        } else {
            IngestedPaths::none()
        };
        let files = pending_files(dir, ROUTE_EXTENSION, &ingested)?;

        let mut ids = IdSequence::seed(self.pool, ROUTES_TABLE).await?;
        let mut routes = Vec::new();
        let mut points = Vec::new();
        let mut added = 0u64;

        for path in files {
            let file_path = stored_path(&path);
            let track = parse_gpx_file(&path)?;

            let Some(summary) = RouteSummary::of(&track) else {
                FileOutcome::Empty.log(&file_path);
                continue;
            };

            let route_id = ids.advance();
            debug!(
                path = %file_path,
                route_id,
                points = summary.point_count,
                distance_km = summary.distance_km,
                "Parsed route"
            );

            points.extend(track.into_iter().enumerate().map(|(index, point)| RoutePointRow {
                route_id,
                point_index: index as i64,
                point,
            }));
            routes.push(RouteRow {
                id: route_id,
                file_path,
                summary,
            });

            if points.len() >= self.flush_threshold {
                added += self.flush(&mut routes, &mut points).await?;
            }
        }

        added += self.flush(&mut routes, &mut points).await?;
        schema::create_route_indexes(self.pool).await?;

        info!(dir = %dir.display(), routes = added, "Workout routes imported");
        Ok(added)
    }

    async fn flush(&self, routes: &mut Vec<RouteRow>, points: &mut Vec<RoutePointRow>) -> Result<u64> {
        if routes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let written = insert_with_children(&mut tx, routes.as_slice(), points.as_slice()).await?;
        tx.commit().await?;

        for route in routes.iter() {
            let outcome = if written.contains(&route.id) {
                FileOutcome::Ingested
            } else {
                FileOutcome::Duplicate
            };
            outcome.log(&route.file_path);
        }

        debug!(routes = written.len(), points = points.len(), "Committed route batch");
        routes.clear();
        points.clear();

        Ok(written.len() as u64)
    }
}
