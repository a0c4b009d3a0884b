//! # Area-Map Engine
//!
//! Stateful engine for the admin area map: holds the latest live-location
//! snapshot, the clusters derived from it, the map layer store, and the trail
//! display state. The pure clustering/consolidation functions never hold
//! state; this engine is the one place the UI-level state machine lives.
//!
//! ## State machine
//!
//! States: `Idle`, `Fetching`, `Displaying`, `ShowingHistory`. Transitions
//! are driven by the caller (timer tick, manual refresh, marker click,
//! history toggle); the engine itself runs no timers and performs no I/O.
//! Refreshes are tokened: overlapping fetches are not coordinated, the
//! snapshot from the latest issued refresh wins and stale completions are
//! discarded.

use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::Lazy;

use crate::cluster::{clustered_user_ids, find_clusters};
use crate::layers::{LayerKey, LayerKind, LayerStore, MapLayer};
use crate::{Bounds, Cluster, GeoPoint, ProximityConfig, UserLocation};

/// Cadence for the background location refresh, driven by the caller.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Display state of the area map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No snapshot applied yet.
    Idle,
    /// A refresh has been issued and none has completed since.
    Fetching,
    /// Live markers are shown.
    Displaying,
    /// Live markers plus one user's historical trail are shown.
    ShowingHistory,
}

/// Outcome of a trail toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailToggle {
    /// The trail was toggled off; nothing to compute.
    Hide,
    /// The trail should be shown: consolidate the user's history and call
    /// [`AreaMapEngine::apply_trail`] with the result.
    Show,
}

/// The stateful area-map engine.
pub struct AreaMapEngine {
    cluster_config: ProximityConfig,
    trail_config: ProximityConfig,

    state: EngineState,
    locations: Vec<UserLocation>,
    clusters: Vec<Cluster>,
    layers: LayerStore,

    /// User whose trail is currently shown, if any.
    shown_trail: Option<String>,

    // Refresh generation counters for last-write-wins
    issued_generation: u64,
    applied_generation: u64,
}

impl Default for AreaMapEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AreaMapEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(ProximityConfig::default(), ProximityConfig::default())
    }

    /// Create an engine with custom clustering and trail radii.
    pub fn with_config(cluster_config: ProximityConfig, trail_config: ProximityConfig) -> Self {
        Self {
            cluster_config,
            trail_config,
            state: EngineState::Idle,
            locations: Vec::new(),
            clusters: Vec::new(),
            layers: LayerStore::new(),
            shown_trail: None,
            issued_generation: 0,
            applied_generation: 0,
        }
    }

    /// Current display state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Radius used when consolidating trails for display.
    pub fn trail_config(&self) -> &ProximityConfig {
        &self.trail_config
    }

    /// Latest applied snapshot.
    pub fn locations(&self) -> &[UserLocation] {
        &self.locations
    }

    /// Clusters derived from the latest snapshot.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Users from the latest snapshot that render as standalone markers.
    pub fn unclustered(&self) -> Vec<&UserLocation> {
        let clustered = clustered_user_ids(&self.clusters);
        self.locations
            .iter()
            .filter(|l| !clustered.contains(&l.user_id))
            .collect()
    }

    /// Current map layers.
    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// User whose trail is currently shown.
    pub fn shown_trail(&self) -> Option<&str> {
        self.shown_trail.as_deref()
    }

    /// Bounding box of the latest snapshot, for fitting the viewport.
    pub fn viewport_bounds(&self) -> Option<Bounds> {
        let points: Vec<GeoPoint> = self.locations.iter().map(|l| l.position.point).collect();
        Bounds::from_points(&points)
    }

    // ========================================================================
    // Refresh (timer tick / manual / mount)
    // ========================================================================

    /// Begin a location refresh and get its generation token.
    ///
    /// Every refresh source (initial mount, 5-minute tick, manual button)
    /// funnels through here. The caller fetches the snapshot and hands it
    /// back via [`apply_snapshot`](Self::apply_snapshot) with this token.
    pub fn begin_refresh(&mut self) -> u64 {
        self.issued_generation += 1;
        if matches!(self.state, EngineState::Idle | EngineState::Displaying) {
            self.state = EngineState::Fetching;
        }
        self.issued_generation
    }

    /// Apply a completed fetch. Returns false if the token is stale.
    ///
    /// Overlapping refreshes are not mutexed; a completion is applied only
    /// if no later-issued refresh has already been applied, so the latest
    /// snapshot wins. Samples with invalid coordinates are dropped here, at
    /// ingestion, with a warning - never inside the clustering loop.
    pub fn apply_snapshot(&mut self, token: u64, locations: Vec<UserLocation>) -> bool {
        if token <= self.applied_generation {
            debug!(
                "apply_snapshot: discarding stale fetch (token {}, applied {})",
                token, self.applied_generation
            );
            return false;
        }

        let before = locations.len();
        let locations: Vec<UserLocation> = locations
            .into_iter()
            .filter(|l| {
                let valid = l.position.point.is_valid();
                if !valid {
                    warn!(
                        "dropping location for user {} with invalid coordinates ({}, {})",
                        l.user_id, l.position.point.latitude, l.position.point.longitude
                    );
                }
                valid
            })
            .collect();

        self.clusters = find_clusters(&locations, &self.cluster_config);
        self.locations = locations;
        self.applied_generation = token;

        let desired = self.marker_layers();
        let outcome = self.layers.reconcile(desired, |key| !key.is_trail());

        info!(
            "applied snapshot {}: {} users ({} dropped), {} clusters, layers +{}/~{}/-{}",
            token,
            self.locations.len(),
            before - self.locations.len(),
            self.clusters.len(),
            outcome.added.len(),
            outcome.updated.len(),
            outcome.removed.len()
        );

        // A shown trail stays shown across background refreshes.
        self.state = if self.shown_trail.is_some() {
            EngineState::ShowingHistory
        } else {
            EngineState::Displaying
        };

        true
    }

    /// Desired marker layers for the current snapshot: one aggregate marker
    /// per cluster, one standalone marker per unclustered user.
    fn marker_layers(&self) -> Vec<MapLayer> {
        let mut desired = Vec::with_capacity(self.clusters.len() + self.locations.len());

        for cluster in &self.clusters {
            desired.push(MapLayer {
                key: LayerKey::ClusterMarker(cluster.id().to_string()),
                kind: LayerKind::Marker {
                    point: cluster.center(),
                    label: cluster.len().to_string(),
                },
            });
        }

        for user in self.unclustered() {
            desired.push(MapLayer {
                key: LayerKey::UserMarker(user.user_id.clone()),
                kind: LayerKind::Marker {
                    point: user.position.point,
                    label: user.display_name.clone(),
                },
            });
        }

        desired
    }

    // ========================================================================
    // Trail display
    // ========================================================================

    /// Toggle a user's historical trail.
    ///
    /// Any previously drawn trail layers are cleared first, whichever branch
    /// is taken. Re-selecting the user whose trail is shown hides it without
    /// recomputing; selecting a different user returns [`TrailToggle::Show`]
    /// and the caller consolidates that user's history and calls
    /// [`apply_trail`](Self::apply_trail).
    pub fn toggle_trail(&mut self, user_id: &str) -> TrailToggle {
        let cleared = self.layers.remove_matching(LayerKey::is_trail);
        if !cleared.is_empty() {
            debug!("cleared {} trail layers", cleared.len());
        }

        if self.shown_trail.as_deref() == Some(user_id) {
            self.shown_trail = None;
            self.state = if self.locations.is_empty() {
                EngineState::Idle
            } else {
                EngineState::Displaying
            };
            return TrailToggle::Hide;
        }

        self.shown_trail = Some(user_id.to_string());
        self.state = EngineState::ShowingHistory;
        TrailToggle::Show
    }

    /// Apply a computed trail for a user. Returns false if that user's trail
    /// is no longer the one being shown (the display was toggled while the
    /// path was in flight); stale results are simply not drawn.
    pub fn apply_trail(
        &mut self,
        user_id: &str,
        routed_path: Vec<GeoPoint>,
        waypoints: &[GeoPoint],
    ) -> bool {
        if self.shown_trail.as_deref() != Some(user_id) {
            info!("discarding trail for {}: display state moved on", user_id);
            return false;
        }

        let mut desired = Vec::with_capacity(waypoints.len() + 1);
        desired.push(MapLayer {
            key: LayerKey::TrailPath(user_id.to_string()),
            kind: LayerKind::Polyline {
                points: routed_path,
            },
        });
        for (index, point) in waypoints.iter().enumerate() {
            desired.push(MapLayer {
                key: LayerKey::TrailWaypoint {
                    user_id: user_id.to_string(),
                    index,
                },
                kind: LayerKind::Marker {
                    point: *point,
                    label: (index + 1).to_string(),
                },
            });
        }

        self.layers.reconcile(desired, LayerKey::is_trail);
        true
    }
}

// ============================================================================
// Singleton
// ============================================================================

/// Process-wide engine instance.
pub static ENGINE: Lazy<Mutex<AreaMapEngine>> = Lazy::new(|| Mutex::new(AreaMapEngine::new()));

/// Run a closure against the global engine.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut AreaMapEngine) -> R,
{
    let mut engine = ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PositionSample;
    use chrono::Utc;

    fn loc(id: &str, lat: f64, lng: f64) -> UserLocation {
        UserLocation::new(id, id.to_uppercase(), PositionSample::new(lat, lng, Utc::now()))
    }

    fn snapshot() -> Vec<UserLocation> {
        vec![
            loc("a", 0.0, 0.0),
            loc("b", 0.0, 0.0003),
            loc("lone", 2.0, 2.0),
        ]
    }

    #[test]
    fn test_initial_state_is_idle() {
        let engine = AreaMapEngine::new();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.viewport_bounds().is_none());
    }

    #[test]
    fn test_refresh_applies_snapshot_and_builds_layers() {
        let mut engine = AreaMapEngine::new();
        let token = engine.begin_refresh();
        assert_eq!(engine.state(), EngineState::Fetching);

        assert!(engine.apply_snapshot(token, snapshot()));
        assert_eq!(engine.state(), EngineState::Displaying);
        assert_eq!(engine.clusters().len(), 1);
        assert_eq!(engine.unclustered().len(), 1);

        // One aggregate marker plus one standalone marker.
        assert_eq!(engine.layers().len(), 2);
        assert!(engine
            .layers()
            .contains(&LayerKey::ClusterMarker("a".to_string())));
        assert!(engine
            .layers()
            .contains(&LayerKey::UserMarker("lone".to_string())));
        assert!(engine.viewport_bounds().is_some());
    }

    #[test]
    fn test_latest_fetch_wins() {
        let mut engine = AreaMapEngine::new();
        let first = engine.begin_refresh();
        let second = engine.begin_refresh();

        // The later-issued fetch completes first and is applied.
        assert!(engine.apply_snapshot(second, snapshot()));
        // The earlier fetch completing afterwards is discarded.
        assert!(!engine.apply_snapshot(first, vec![loc("stale", 5.0, 5.0)]));

        assert_eq!(engine.locations().len(), 3);
        assert_eq!(engine.state(), EngineState::Displaying);
    }

    #[test]
    fn test_invalid_coordinates_dropped_at_ingestion() {
        let mut engine = AreaMapEngine::new();
        let token = engine.begin_refresh();

        let mut locations = snapshot();
        locations.push(loc("bad", f64::NAN, 0.0));
        locations.push(loc("worse", 95.0, 0.0));

        assert!(engine.apply_snapshot(token, locations));
        assert_eq!(engine.locations().len(), 3);
    }

    #[test]
    fn test_trail_toggle_show_then_hide() {
        let mut engine = AreaMapEngine::new();
        let token = engine.begin_refresh();
        engine.apply_snapshot(token, snapshot());

        assert_eq!(engine.toggle_trail("a"), TrailToggle::Show);
        assert_eq!(engine.state(), EngineState::ShowingHistory);

        let waypoints = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)];
        assert!(engine.apply_trail("a", waypoints.clone(), &waypoints));
        assert!(engine
            .layers()
            .contains(&LayerKey::TrailPath("a".to_string())));

        // Re-selecting the same user clears and hides without recompute.
        assert_eq!(engine.toggle_trail("a"), TrailToggle::Hide);
        assert_eq!(engine.state(), EngineState::Displaying);
        assert!(!engine
            .layers()
            .contains(&LayerKey::TrailPath("a".to_string())));
        assert!(engine.shown_trail().is_none());
    }

    #[test]
    fn test_trail_switch_user_clears_previous() {
        let mut engine = AreaMapEngine::new();
        let token = engine.begin_refresh();
        engine.apply_snapshot(token, snapshot());

        engine.toggle_trail("a");
        let path_a = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)];
        engine.apply_trail("a", path_a.clone(), &path_a);

        // Selecting a different user clears a's layers before the new
        // trail is computed.
        assert_eq!(engine.toggle_trail("b"), TrailToggle::Show);
        assert!(!engine
            .layers()
            .contains(&LayerKey::TrailPath("a".to_string())));
        assert_eq!(engine.shown_trail(), Some("b"));

        // The in-flight result for a completes late and is not drawn.
        assert!(!engine.apply_trail("a", path_a.clone(), &path_a));
        assert!(!engine
            .layers()
            .contains(&LayerKey::TrailPath("a".to_string())));
    }

    #[test]
    fn test_background_refresh_keeps_trail_shown() {
        let mut engine = AreaMapEngine::new();
        let token = engine.begin_refresh();
        engine.apply_snapshot(token, snapshot());

        engine.toggle_trail("a");
        let path = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)];
        engine.apply_trail("a", path.clone(), &path);

        let token = engine.begin_refresh();
        engine.apply_snapshot(token, snapshot());

        assert_eq!(engine.state(), EngineState::ShowingHistory);
        assert!(engine
            .layers()
            .contains(&LayerKey::TrailPath("a".to_string())));
    }

    #[test]
    fn test_poll_interval() {
        assert_eq!(POLL_INTERVAL, Duration::from_secs(300));
    }
}
