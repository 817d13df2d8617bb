//! Workout route import
//!
//! One GPX file per workout route. Each file becomes a `workout_routes` row
//! carrying its distance and bounding box, plus one `workout_route_points` row
//! per track point.

pub mod geo;
pub mod parser;
pub mod storage;

pub use geo::{haversine_km, track_distance_km, BoundingBox, EARTH_RADIUS_KM};
pub use parser::{parse_gpx, parse_gpx_file, TrackPoint};
pub use storage::RouteIngester;

/// Extension of route files
pub const ROUTE_EXTENSION: &str = "gpx";

/// Derived figures of one parsed track
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub point_count: usize,
    pub distance_km: f64,
    pub bounds: BoundingBox,
}

impl RouteSummary {
    /// Summarize a track; `None` when it has no points
    pub fn of(points: &[TrackPoint]) -> Option<Self> {
        let first = points.first()?;
        let last = points.last()?;

        Some(Self {
            start_time: first.time.clone(),
            end_time: last.time.clone(),
            point_count: points.len(),
            distance_km: track_distance_km(points),
            bounds: BoundingBox::of(points),
        })
    }
}
