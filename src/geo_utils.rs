//! Geographic utilities: great-circle distance, path length, centroid.
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees) and
//! are pure - NaN or infinite inputs propagate into the output rather than
//! being handled here. Callers validate at ingestion.

use geo::{Distance, Haversine, Point};

use crate::GeoPoint;

/// Calculate the great-circle distance between two points using the
/// Haversine formula. Returns meters.
///
/// Symmetric up to floating-point rounding: `d(a, b) == d(b, a)`.
///
/// # Example
///
/// ```rust
/// use area_map::{geo_utils, GeoPoint};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a polyline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point input returns 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Arithmetic-mean centroid of a set of points.
///
/// This is the centroid definition used for both cluster markers and
/// consolidated trail waypoints. Returns (0, 0) for empty input.
pub fn compute_center(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GeoPoint::new(sum_lat / n, sum_lng / n)
}
