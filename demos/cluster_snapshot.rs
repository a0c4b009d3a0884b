//! Walkthrough: cluster a live snapshot, then consolidate and route a trail.
//!
//! Run with: cargo run --example cluster_snapshot

use area_map::{
    build_routed_path, clustered_user_ids, consolidate_trail, find_clusters, trail_statistics,
    GeoPoint, PositionSample, ProximityConfig, UserLocation,
};
use chrono::Utc;

#[tokio::main]
async fn main() {
    env_logger::init();

    let now = Utc::now();
    let snapshot = vec![
        UserLocation::new("u1", "Alice", PositionSample::new(51.5074, -0.1278, now)),
        UserLocation::new("u2", "Bob", PositionSample::new(51.5076, -0.1280, now)),
        UserLocation::new("u3", "Carol", PositionSample::new(51.5500, -0.2000, now)),
    ];

    let config = ProximityConfig::default();
    let clusters = find_clusters(&snapshot, &config);
    let clustered = clustered_user_ids(&clusters);

    println!("{} clusters:", clusters.len());
    for cluster in &clusters {
        let center = cluster.center();
        println!(
            "  cluster {} with {} members at ({:.4}, {:.4})",
            cluster.id(),
            cluster.len(),
            center.latitude,
            center.longitude
        );
    }
    for user in snapshot.iter().filter(|u| !clustered.contains(&u.user_id)) {
        println!("  standalone marker: {}", user.display_name);
    }

    // A noisy trail: three tight fixes near the depot, then two stops.
    let samples = vec![
        PositionSample::new(51.5074, -0.1278, now).with_accuracy(10.0),
        PositionSample::new(51.5075, -0.1279, now).with_accuracy(20.0),
        PositionSample::new(51.5076, -0.1277, now),
        PositionSample::new(51.5150, -0.1400, now).with_accuracy(6.0),
        PositionSample::new(51.5220, -0.1550, now).with_accuracy(9.0),
    ];
    let stats = trail_statistics(&samples);
    println!(
        "trail: {} samples, average accuracy {:.2} m",
        stats.sample_count, stats.average_accuracy
    );

    let raw: Vec<GeoPoint> = samples.iter().map(|s| s.point).collect();
    let waypoints = consolidate_trail(&raw, &config);
    println!("consolidated to {} waypoints", waypoints.len());

    // Stand-in for the road-snapping service: midpoint insertion.
    let path = build_routed_path(&waypoints, |start, end| async move {
        Ok(vec![
            start,
            GeoPoint::new(
                (start.latitude + end.latitude) / 2.0,
                (start.longitude + end.longitude) / 2.0,
            ),
            end,
        ])
    })
    .await;

    println!("routed path has {} points", path.len());
}
