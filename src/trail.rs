//! Historical trail consolidation and routed-path assembly.
//!
//! A trail is the time-ordered sequence of one user's position samples for a
//! date. Consolidation collapses samples that lie within a radius of a seed
//! sample into a single centroid waypoint, cutting point density before the
//! reduced path is handed to the road-snapping service.

use std::future::Future;

use log::debug;

use crate::error::Result;
use crate::geo_utils::{compute_center, haversine_distance, polyline_length};
use crate::{GeoPoint, PositionSample, ProximityConfig, TrailStats};

/// Collapse a chronologically-ordered trail into centroid waypoints.
///
/// Same greedy seed-expansion pattern as live clustering, but index-based and
/// total: every input point lands in exactly one output centroid, and
/// singleton groups are emitted as-is (a lone point is its own centroid).
/// Output order follows seed-encounter order, so the reduced path stays
/// chronological. Empty input yields an empty vec.
pub fn consolidate_trail(points: &[GeoPoint], config: &ProximityConfig) -> Vec<GeoPoint> {
    let mut processed = vec![false; points.len()];
    let mut output = Vec::new();

    for i in 0..points.len() {
        if processed[i] {
            continue;
        }
        processed[i] = true;

        let seed = points[i];
        let mut group = vec![seed];

        // Expansion is measured from the seed, not the running centroid.
        for (j, point) in points.iter().enumerate() {
            if processed[j] {
                continue;
            }
            if haversine_distance(&seed, point) <= config.radius_meters {
                processed[j] = true;
                group.push(*point);
            }
        }

        output.push(compute_center(&group));
    }

    debug!(
        "consolidate_trail: {} raw points -> {} waypoints",
        points.len(),
        output.len()
    );

    output
}

/// Summarize a raw (non-consolidated) trail.
///
/// `sample_count` counts every raw sample. `average_accuracy` averages only
/// the samples that report an accuracy - missing values are excluded, not
/// treated as zero - and is rounded to 2 decimals; it is 0.0 when no sample
/// reports one.
pub fn trail_statistics(samples: &[PositionSample]) -> TrailStats {
    let accuracies: Vec<f64> = samples.iter().filter_map(|s| s.accuracy).collect();

    let average_accuracy = if accuracies.is_empty() {
        0.0
    } else {
        round2(accuracies.iter().sum::<f64>() / accuracies.len() as f64)
    };

    TrailStats {
        sample_count: samples.len(),
        average_accuracy,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Assemble a road-snapped path through consolidated waypoints.
///
/// For each consecutive waypoint pair the segment source is awaited
/// sequentially (concatenation depends on adjacency, so segments are never
/// fetched concurrently). A failed or degenerate (<2 point) segment degrades
/// to the direct two-point line; there is no retry of the failed call, and a
/// segment failure never aborts the remaining segments. Each segment's last
/// point is dropped before appending the next so junctions appear once, and
/// the final waypoint is appended once at the end.
///
/// Fewer than two waypoints are returned unchanged.
pub async fn build_routed_path<F, Fut>(waypoints: &[GeoPoint], mut route_segment: F) -> Vec<GeoPoint>
where
    F: FnMut(GeoPoint, GeoPoint) -> Fut,
    Fut: Future<Output = Result<Vec<GeoPoint>>>,
{
    if waypoints.len() < 2 {
        return waypoints.to_vec();
    }

    let mut path: Vec<GeoPoint> = Vec::new();

    for pair in waypoints.windows(2) {
        let (start, end) = (pair[0], pair[1]);

        let segment = match route_segment(start, end).await {
            Ok(seg) if seg.len() >= 2 => seg,
            Ok(_) => {
                debug!("route segment returned no usable geometry, using straight line");
                vec![start, end]
            }
            Err(e) => {
                debug!("route segment failed ({}), using straight line", e);
                vec![start, end]
            }
        };

        path.extend_from_slice(&segment[..segment.len() - 1]);
    }

    if let Some(last) = waypoints.last() {
        path.push(*last);
    }

    debug!(
        "build_routed_path: {} waypoints -> {} points ({:.0} m)",
        waypoints.len(),
        path.len(),
        polyline_length(&path)
    );

    path
}
