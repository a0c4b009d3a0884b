//! Proximity clustering of live user positions.
//!
//! Partitions a snapshot of user locations into groups of mutually-nearby
//! users so the map can render one aggregate marker per group. Grouping is
//! greedy and seed-based: each unclaimed location starts a cluster and claims
//! every other unclaimed location within the radius of *the seed* in a single
//! pass. Newly added members are not re-expanded, so the result can depend on
//! input order when points chain just under the radius - that behavior is
//! kept for compatibility with the reference rendering.
//! [`find_clusters_connected`] is the explicit opt-in upgrade to full
//! connected components.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::union_find::UnionFind;
use crate::{Cluster, ProximityConfig, UserLocation};

/// Partition live locations into clusters of two or more members.
///
/// Greedy single pass in input order:
/// 1. Skip locations already claimed by an earlier cluster.
/// 2. Seed a cluster with the current location.
/// 3. Claim every other unclaimed location within `radius_meters` of the seed.
/// 4. Emit the cluster only if it gained at least one more member; singleton
///    seeds render as individual markers instead.
///
/// Deterministic for a given input order. Empty input yields an empty vec.
/// Duplicate user ids in the input are a precondition violation (undefined
/// grouping) - the caller guarantees uniqueness per snapshot.
pub fn find_clusters(locations: &[UserLocation], config: &ProximityConfig) -> Vec<Cluster> {
    let mut claimed: HashSet<&str> = HashSet::with_capacity(locations.len());
    let mut clusters = Vec::new();

    for seed in locations {
        if claimed.contains(seed.user_id.as_str()) {
            continue;
        }
        claimed.insert(seed.user_id.as_str());

        let mut members = vec![seed.clone()];

        // One expansion pass around the seed only - no transitive re-expansion
        // around members added below.
        for other in locations {
            if claimed.contains(other.user_id.as_str()) {
                continue;
            }
            let dist = haversine_distance(&seed.position.point, &other.position.point);
            if dist <= config.radius_meters {
                claimed.insert(other.user_id.as_str());
                members.push(other.clone());
            }
        }

        if members.len() > 1 {
            clusters.push(Cluster { members });
        }
    }

    debug!(
        "find_clusters: {} locations -> {} clusters ({} users clustered)",
        locations.len(),
        clusters.len(),
        clusters.iter().map(Cluster::len).sum::<usize>()
    );

    clusters
}

/// Union of all member ids across the given clusters.
///
/// The complement against the full snapshot is the set of users to render as
/// standalone markers.
pub fn clustered_user_ids(clusters: &[Cluster]) -> HashSet<String> {
    clusters
        .iter()
        .flat_map(|c| c.members.iter().map(|m| m.user_id.clone()))
        .collect()
}

/// Connected-component variant of [`find_clusters`].
///
/// Unions every pair of locations within `radius_meters` of each other, so a
/// chain of points spaced just under the radius becomes one cluster even when
/// later links are far from the first seed. Groups are reported in order of
/// their first-encountered member, members in input order, and singletons are
/// dropped like in [`find_clusters`].
///
/// This changes grouping relative to the seed-only default for chained
/// layouts; callers opt in where "true" connected components are wanted.
pub fn find_clusters_connected(
    locations: &[UserLocation],
    config: &ProximityConfig,
) -> Vec<Cluster> {
    let mut uf: UnionFind<String> = UnionFind::with_capacity(locations.len());
    for loc in locations {
        uf.make_set(loc.user_id.clone());
    }

    for (i, a) in locations.iter().enumerate() {
        for b in &locations[i + 1..] {
            let dist = haversine_distance(&a.position.point, &b.position.point);
            if dist <= config.radius_meters {
                uf.union(&a.user_id, &b.user_id);
            }
        }
    }

    // Rebuild in input order so output is deterministic.
    let mut by_root: HashMap<String, Vec<UserLocation>> = HashMap::new();
    let mut root_order: Vec<String> = Vec::new();
    for loc in locations {
        let root = uf.find(&loc.user_id);
        if !by_root.contains_key(&root) {
            root_order.push(root.clone());
        }
        by_root.entry(root).or_default().push(loc.clone());
    }

    root_order
        .into_iter()
        .filter_map(|root| {
            let members = by_root.remove(&root)?;
            if members.len() > 1 {
                Some(Cluster { members })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PositionSample;
    use chrono::Utc;

    fn loc(id: &str, lat: f64, lng: f64) -> UserLocation {
        UserLocation::new(id, id.to_uppercase(), PositionSample::new(lat, lng, Utc::now()))
    }

    fn ids(cluster: &Cluster) -> Vec<&str> {
        cluster.members.iter().map(|m| m.user_id.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let clusters = find_clusters(&[], &ProximityConfig::default());
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_all_far_apart_yields_no_clusters() {
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 10.0, 10.0),
            loc("c", -10.0, 20.0),
        ];
        let clusters = find_clusters(&locations, &ProximityConfig::default());
        assert!(clusters.is_empty());
        assert!(clustered_user_ids(&clusters).is_empty());
    }

    #[test]
    fn test_all_near_seed_single_cluster() {
        // ~0.0009 deg longitude at the equator is ~100 m; keep everyone
        // well inside the radius of the first location.
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0003),
            loc("c", 0.0003, 0.0),
            loc("d", 0.0002, 0.0002),
        ];
        let clusters = find_clusters(&locations, &ProximityConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["a", "b", "c", "d"]);
        assert_eq!(clusters[0].seed().user_id, "a");
    }

    #[test]
    fn test_two_pairs_five_km_apart() {
        // Two pairs ~10 m apart each; the pairs are ~5 km from each other.
        let locations = vec![
            loc("a1", 0.0, 0.0),
            loc("a2", 0.0, 0.00009),
            loc("b1", 0.045, 0.0),
            loc("b2", 0.045, 0.00009),
        ];
        let clusters = find_clusters(&locations, &ProximityConfig::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1].len(), 2);
        assert_eq!(clustered_user_ids(&clusters).len(), 4);
    }

    #[test]
    fn test_partition_property() {
        // Clustered ids plus unclustered ids cover the snapshot exactly once.
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0003),
            loc("c", 1.0, 1.0),
            loc("d", 2.0, 2.0),
            loc("e", 2.0, 2.0003),
        ];
        let clusters = find_clusters(&locations, &ProximityConfig::default());
        let clustered = clustered_user_ids(&clusters);

        let member_count: usize = clusters.iter().map(Cluster::len).sum();
        assert_eq!(member_count, clustered.len()); // no duplicates

        let unclustered: Vec<&str> = locations
            .iter()
            .map(|l| l.user_id.as_str())
            .filter(|id| !clustered.contains(*id))
            .collect();
        assert_eq!(clustered.len() + unclustered.len(), locations.len());
        assert_eq!(unclustered, vec!["c"]);
    }

    #[test]
    fn test_members_within_radius_of_seed() {
        let config = ProximityConfig::default();
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0005),
            loc("c", 0.0004, 0.0004),
            loc("d", 0.0, 0.002), // ~220 m out
        ];
        let clusters = find_clusters(&locations, &config);
        for cluster in &clusters {
            let seed = cluster.seed().position.point;
            for member in &cluster.members[1..] {
                let d = haversine_distance(&seed, &member.position.point);
                assert!(d <= config.radius_meters, "member {} is {}m out", member.user_id, d);
            }
        }
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0004),
            loc("c", 0.0008, 0.0),
            loc("d", 5.0, 5.0),
        ];
        let config = ProximityConfig::default();
        let first = find_clusters(&locations, &config);
        let second = find_clusters(&locations, &config);

        assert_eq!(first.len(), second.len());
        for (c1, c2) in first.iter().zip(&second) {
            assert_eq!(ids(c1), ids(c2));
        }
    }

    #[test]
    fn test_no_singleton_clusters_emitted() {
        let locations = vec![loc("a", 0.0, 0.0), loc("b", 10.0, 10.0)];
        let clusters = find_clusters(&locations, &ProximityConfig::default());
        assert!(clusters.iter().all(|c| c.len() >= 2));
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_seed_only_vs_connected_on_chain() {
        // Chain spaced ~89 m apart: p1 is within 100 m of the seed, p2 is
        // within 100 m of p1 but ~178 m from the seed.
        let locations = vec![
            loc("p0", 0.0, 0.0),
            loc("p1", 0.0, 0.0008),
            loc("p2", 0.0, 0.0016),
        ];
        let config = ProximityConfig::default();

        // Seed-only expansion stops at the seed's neighborhood.
        let seeded = find_clusters(&locations, &config);
        assert_eq!(seeded.len(), 1);
        assert_eq!(ids(&seeded[0]), vec!["p0", "p1"]);

        // Connected components chain all three together.
        let connected = find_clusters_connected(&locations, &config);
        assert_eq!(connected.len(), 1);
        assert_eq!(ids(&connected[0]), vec!["p0", "p1", "p2"]);
    }

    #[test]
    fn test_connected_drops_singletons_too() {
        let locations = vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0003),
            loc("lone", 3.0, 3.0),
        ];
        let clusters = find_clusters_connected(&locations, &ProximityConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["a", "b"]);
    }
}
