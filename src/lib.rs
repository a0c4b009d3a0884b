//! # Area Map
//!
//! Live location clustering and GPS trail consolidation for the admin area map.
//!
//! This library provides:
//! - Proximity clustering of live user positions (aggregate vs individual markers)
//! - Consolidation of historical GPS trails into reduced waypoint paths
//! - Road-snapped path assembly with per-segment straight-line fallback
//!
//! ## Features
//!
//! - **`http`** - Enable HTTP clients for the location API and road-snapping service
//!
//! ## Quick Start
//!
//! ```rust
//! use area_map::{find_clusters, GeoPoint, PositionSample, ProximityConfig, UserLocation};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let locations = vec![
//!     UserLocation::new("u1", "Alice", PositionSample::new(51.5074, -0.1278, now)),
//!     UserLocation::new("u2", "Bob", PositionSample::new(51.5075, -0.1279, now)),
//!     UserLocation::new("u3", "Carol", PositionSample::new(48.8566, 2.3522, now)),
//! ];
//!
//! let clusters = find_clusters(&locations, &ProximityConfig::default());
//! assert_eq!(clusters.len(), 1); // Alice and Bob share a marker, Carol renders alone
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AreaMapError, Result};

// Geographic utilities (distance, length, centroid)
pub mod geo_utils;

// Union-Find data structure for connected-component clustering
pub mod union_find;
pub use union_find::UnionFind;

// Proximity clustering of live user positions
pub mod cluster;
pub use cluster::{clustered_user_ids, find_clusters, find_clusters_connected};

// Historical trail consolidation and routed-path assembly
pub mod trail;
pub use trail::{build_routed_path, consolidate_trail, trail_statistics};

// Map layer store with diff/reconcile
pub mod layers;
pub use layers::{LayerKey, LayerKind, LayerStore, MapLayer, ReconcileOutcome};

// Stateful area-map engine (refresh + trail display state machine)
pub mod engine;
pub use engine::{with_engine, AreaMapEngine, EngineState, TrailToggle, ENGINE, POLL_INTERVAL};

// HTTP clients for the location API and routing service
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{LocationClient, RoutingClient};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude (WGS84 degrees).
///
/// # Example
/// ```
/// use area_map::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A single observed location sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub point: GeoPoint,
    /// Reported GPS accuracy in meters, if the device provided one.
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl PositionSample {
    /// Create a sample without a reported accuracy.
    pub fn new(latitude: f64, longitude: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            point: GeoPoint::new(latitude, longitude),
            accuracy: None,
            recorded_at,
        }
    }

    /// Attach a reported accuracy in meters.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// A position attributed to a user, used for live clustering.
///
/// Constructed fresh on every fetch cycle; immutable within one clustering pass.
/// User ids must be unique within a snapshot - duplicates are a caller-side
/// precondition violation and produce undefined grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub user_id: String,
    pub display_name: String,
    /// Avatar for marker rendering; not used by any algorithm.
    pub avatar_url: Option<String>,
    pub position: PositionSample,
    /// True when the user's tracking session has ended ("offline").
    pub session_ended: bool,
}

impl UserLocation {
    /// Create an online user location with no avatar.
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        position: PositionSample,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            avatar_url: None,
            position,
            session_ended: false,
        }
    }
}

/// A group of mutually-nearby user locations, rendered as one aggregate marker.
///
/// Members keep input order; the first member is the seed the group was
/// expanded around. Only groups of two or more members are reported as
/// clusters - singletons render as individual markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub members: Vec<UserLocation>,
}

impl Cluster {
    /// The seed member the cluster was expanded around.
    pub fn seed(&self) -> &UserLocation {
        &self.members[0]
    }

    /// Stable id for this cluster within a snapshot (the seed's user id).
    pub fn id(&self) -> &str {
        &self.seed().user_id
    }

    /// Arithmetic-mean centroid of the member positions.
    pub fn center(&self) -> GeoPoint {
        let points: Vec<GeoPoint> = self.members.iter().map(|m| m.position.point).collect();
        geo_utils::compute_center(&points)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the cluster has no members (never produced by clustering).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Summary statistics for a historical trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailStats {
    /// Count of raw input samples (not consolidated points).
    pub sample_count: usize,
    /// Mean of the reported accuracies, rounded to 2 decimals.
    /// 0.0 when no sample reports an accuracy.
    pub average_accuracy: f64,
}

/// Bounding box for a set of points (viewport fitting).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Configuration for proximity grouping.
///
/// Shared by the live clusterer and the trail consolidator; both default to
/// a 100 meter radius around the seed point.
#[derive(Debug, Clone)]
pub struct ProximityConfig {
    /// Radius in meters within which points are grouped around a seed.
    pub radius_meters: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            radius_meters: 100.0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
