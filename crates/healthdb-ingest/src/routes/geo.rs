//! Great-circle distance and bounds of a track

use super::parser::TrackPoint;

/// Mean Earth radius (IUGG), in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance between two points given in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Total track length in kilometres
///
/// Sums every adjacent pair of points that both carry coordinates. A point
/// without coordinates contributes nothing and is not bridged over.
pub fn track_distance_km(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .filter_map(|pair| Some((pair[0].coordinates()?, pair[1].coordinates()?)))
        .map(|((lat1, lon1), (lat2, lon2))| haversine_km(lat1, lon1, lat2, lon2))
        .sum()
}

/// Per-axis extent of a track
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
}

impl BoundingBox {
    /// Latitude bounds over points with a latitude, longitude bounds over
    /// points with a longitude
    pub fn of(points: &[TrackPoint]) -> Self {
        let (min_lat, max_lat) = extent(points.iter().filter_map(|p| p.lat));
        let (min_lon, max_lon) = extent(points.iter().filter_map(|p| p.lon));

        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }
}

fn extent(values: impl Iterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    values.fold((None, None), |(min, max), v| {
        (
            Some(min.map_or(v, |m: f64| m.min(v))),
            Some(max.map_or(v, |m: f64| m.max(v))),
        )
    })
}
