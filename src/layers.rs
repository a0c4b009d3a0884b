//! Map layer store with diff/reconcile.
//!
//! The rendering layer owns live marker and polyline objects keyed by domain
//! id. Instead of mutating per-marker globals across refresh cycles, the
//! engine describes the full desired set of layers after each pass and the
//! store reconciles: add missing, update changed, remove stale. The outcome
//! tells the renderer exactly which map objects to create, restyle, or drop.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AreaMapError, Result};
use crate::GeoPoint;

/// Identity of a map layer, keyed by the domain object it renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKey {
    /// Standalone marker for an unclustered user.
    UserMarker(String),
    /// Aggregate marker for a cluster (keyed by the seed's user id).
    ClusterMarker(String),
    /// Road-snapped trail polyline for a user.
    TrailPath(String),
    /// One consolidated waypoint marker along a user's trail.
    TrailWaypoint { user_id: String, index: usize },
}

impl LayerKey {
    /// True for layers that belong to a trail display (path + waypoints).
    pub fn is_trail(&self) -> bool {
        matches!(self, LayerKey::TrailPath(_) | LayerKey::TrailWaypoint { .. })
    }
}

/// Renderable payload of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Marker { point: GeoPoint, label: String },
    Polyline { points: Vec<GeoPoint> },
}

/// A keyed layer as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayer {
    pub key: LayerKey,
    pub kind: LayerKind,
}

/// Result of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub added: Vec<LayerKey>,
    pub updated: Vec<LayerKey>,
    pub removed: Vec<LayerKey>,
}

impl ReconcileOutcome {
    /// True when the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Store of current map layers keyed by [`LayerKey`].
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: HashMap<LayerKey, LayerKind>,
}

impl LayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers currently held.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no layers are held.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Look up a layer's payload.
    pub fn get(&self, key: &LayerKey) -> Option<&LayerKind> {
        self.layers.get(key)
    }

    /// True when a layer with this key is held.
    pub fn contains(&self, key: &LayerKey) -> bool {
        self.layers.contains_key(key)
    }

    /// Reconcile the store against a desired set of layers.
    ///
    /// Only keys matching `in_scope` are eligible for removal, so callers
    /// managing disjoint key ranges (live markers vs trail layers) never
    /// clobber each other. Idempotent: reconciling the same desired set
    /// twice yields a no-op the second time.
    pub fn reconcile<F>(&mut self, desired: Vec<MapLayer>, in_scope: F) -> ReconcileOutcome
    where
        F: Fn(&LayerKey) -> bool,
    {
        let mut outcome = ReconcileOutcome::default();
        let desired_keys: HashSet<&LayerKey> = desired.iter().map(|l| &l.key).collect();

        let stale: Vec<LayerKey> = self
            .layers
            .keys()
            .filter(|k| in_scope(k) && !desired_keys.contains(k))
            .cloned()
            .collect();
        for key in stale {
            self.layers.remove(&key);
            outcome.removed.push(key);
        }

        for layer in desired {
            let unchanged = self
                .layers
                .get(&layer.key)
                .map_or(false, |existing| *existing == layer.kind);
            if unchanged {
                continue;
            }
            let previous = self.layers.insert(layer.key.clone(), layer.kind);
            if previous.is_some() {
                outcome.updated.push(layer.key);
            } else {
                outcome.added.push(layer.key);
            }
        }

        outcome
    }

    /// Remove every layer matching the predicate, returning the removed keys.
    pub fn remove_matching<F>(&mut self, predicate: F) -> Vec<LayerKey>
    where
        F: Fn(&LayerKey) -> bool,
    {
        let keys: Vec<LayerKey> = self.layers.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &keys {
            self.layers.remove(key);
        }
        keys
    }

    /// Clone out the current layer set.
    pub fn snapshot(&self) -> Vec<MapLayer> {
        self.layers
            .iter()
            .map(|(key, kind)| MapLayer {
                key: key.clone(),
                kind: kind.clone(),
            })
            .collect()
    }

    /// Serialize the current layer set as JSON for the rendering layer.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()).map_err(|e| AreaMapError::Internal {
            message: format!("layer serialization failed: {}", e),
        })
    }
}
