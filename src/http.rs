//! HTTP clients for the location API and the road-snapping service.
//!
//! The core consumes and produces in-memory values only; this module is the
//! boundary where wire shapes, auth, and coordinate axis order are dealt
//! with. Routing failures are returned as errors and absorbed by
//! [`build_routed_path`](crate::trail::build_routed_path)'s straight-line
//! fallback - there is no retry here by design.

use std::time::Duration;

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AreaMapError, Result};
use crate::{GeoPoint, PositionSample, UserLocation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct RecordCoords {
    lat: f64,
    lng: f64,
    accuracy: Option<f64>,
}

/// One record from `GET /locations/{userId}/history?date=`.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    coords: RecordCoords,
    ts: DateTime<Utc>,
}

/// One record from `GET /locations/all?date=`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveRecord {
    user_id: String,
    display_name: String,
    avatar_url: Option<String>,
    coords: RecordCoords,
    ts: DateTime<Utc>,
    session_end: Option<DateTime<Utc>>,
}

// ============================================================================
// Location API client
// ============================================================================

/// Client for the workforce location API.
pub struct LocationClient {
    client: Client,
    base_url: String,
    auth_header: String,
}

impl LocationClient {
    /// Create a client for the given API base URL and key.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let auth = base64::engine::general_purpose::STANDARD.encode(format!("API_KEY:{}", api_key));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AreaMapError::Http {
                message: format!("failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {}", auth),
        })
    }

    /// Fetch the live-location snapshot for a date.
    pub async fn fetch_live_locations(&self, date: NaiveDate) -> Result<Vec<UserLocation>> {
        let url = format!("{}/locations/all?date={}", self.base_url, date.format("%Y-%m-%d"));
        let records: Vec<LiveRecord> = self.get_json(&url).await?;
        let locations = locations_from_records(records);
        info!("fetched {} live locations for {}", locations.len(), date);
        Ok(locations)
    }

    /// Fetch one user's position history for a date, sorted ascending by
    /// timestamp and with invalid coordinates dropped.
    pub async fn fetch_history(&self, user_id: &str, date: NaiveDate) -> Result<Vec<PositionSample>> {
        let url = format!(
            "{}/locations/{}/history?date={}",
            self.base_url,
            user_id,
            date.format("%Y-%m-%d")
        );
        let records: Vec<HistoryRecord> = self.get_json(&url).await?;
        let samples = samples_from_records(records);
        info!("fetched {} history samples for {} on {}", samples.len(), user_id, date);
        Ok(samples)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .map_err(|e| AreaMapError::Http {
                message: e.to_string(),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AreaMapError::Http {
                message: format!("request to {} failed", url),
                status_code: Some(status.as_u16()),
            });
        }

        response.json::<T>().await.map_err(|e| AreaMapError::Http {
            message: format!("response parse error: {}", e),
            status_code: None,
        })
    }
}

fn locations_from_records(records: Vec<LiveRecord>) -> Vec<UserLocation> {
    records
        .into_iter()
        .filter_map(|r| {
            let point = GeoPoint::new(r.coords.lat, r.coords.lng);
            if !point.is_valid() {
                warn!("dropping live record for {} with invalid coordinates", r.user_id);
                return None;
            }
            Some(UserLocation {
                user_id: r.user_id,
                display_name: r.display_name,
                avatar_url: r.avatar_url,
                position: PositionSample {
                    point,
                    accuracy: r.coords.accuracy,
                    recorded_at: r.ts,
                },
                session_ended: r.session_end.is_some(),
            })
        })
        .collect()
}

fn samples_from_records(records: Vec<HistoryRecord>) -> Vec<PositionSample> {
    let mut samples: Vec<PositionSample> = records
        .into_iter()
        .filter_map(|r| {
            let point = GeoPoint::new(r.coords.lat, r.coords.lng);
            if !point.is_valid() {
                warn!("dropping history sample with invalid coordinates");
                return None;
            }
            Some(PositionSample {
                point,
                accuracy: r.coords.accuracy,
                recorded_at: r.ts,
            })
        })
        .collect();

    // Consolidation requires chronological order; the API does not
    // guarantee it.
    samples.sort_by_key(|s| s.recorded_at);
    samples
}

// ============================================================================
// Routing service client
// ============================================================================

#[derive(Debug, Deserialize)]
struct RouteResponse {
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    geometry: RouteGeometry,
}

#[derive(Debug, Deserialize)]
struct RouteGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Axis-order adapter: the routing service speaks GeoJSON (lng, lat);
/// everything inside this crate is (lat, lng). This is the only place the
/// flip happens.
fn point_from_lnglat(c: &[f64; 2]) -> GeoPoint {
    GeoPoint::new(c[1], c[0])
}

/// Client for the OSRM-style road-snapping service.
pub struct RoutingClient {
    client: Client,
    base_url: String,
}

impl RoutingClient {
    /// Create a client for the given routing service base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AreaMapError::Http {
                message: format!("failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn segment_url(&self, start: GeoPoint, end: GeoPoint) -> String {
        // The service takes (lng,lat) pairs in the path.
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, start.longitude, start.latitude, end.longitude, end.latitude
        )
    }

    /// Fetch a road-snapped path between two points, normalized to (lat,lng).
    ///
    /// Fails on network errors, non-2xx responses, empty route sets, or
    /// malformed geometry. Callers degrade to the straight line; the failed
    /// call itself is never retried.
    pub async fn route_segment(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>> {
        let url = self.segment_url(start, end);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AreaMapError::Routing {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AreaMapError::Routing {
                message: format!("HTTP {}", status),
            });
        }

        let body: RouteResponse = response.json().await.map_err(|e| AreaMapError::Routing {
            message: format!("response parse error: {}", e),
        })?;

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AreaMapError::Routing {
                message: "no route returned".to_string(),
            })?;

        let points: Vec<GeoPoint> = route
            .geometry
            .coordinates
            .iter()
            .map(point_from_lnglat)
            .collect();

        if points.iter().any(|p| !p.is_valid()) {
            return Err(AreaMapError::InvalidCoordinates {
                context: "routing response".to_string(),
                message: "geometry contains out-of-range coordinates".to_string(),
            });
        }

        Ok(points)
    }
}

// ============================================================================
// Blocking wrappers
// ============================================================================

/// Blocking wrapper for host frameworks without an async context.
pub fn fetch_live_locations_blocking(
    client: &LocationClient,
    date: NaiveDate,
) -> Result<Vec<UserLocation>> {
    runtime()?.block_on(client.fetch_live_locations(date))
}

/// Blocking wrapper for host frameworks without an async context.
pub fn fetch_history_blocking(
    client: &LocationClient,
    user_id: &str,
    date: NaiveDate,
) -> Result<Vec<PositionSample>> {
    runtime()?.block_on(client.fetch_history(user_id, date))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| AreaMapError::Internal {
        message: format!("failed to create tokio runtime: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_record_parsing_and_sorting() {
        let json = r#"[
            {"coords": {"lat": 51.51, "lng": -0.12, "accuracy": 8.5}, "ts": "2026-08-30T10:05:00Z"},
            {"coords": {"lat": 51.50, "lng": -0.13}, "ts": "2026-08-30T10:00:00Z"},
            {"coords": {"lat": 99.0, "lng": -0.13, "accuracy": 4.0}, "ts": "2026-08-30T10:02:00Z"}
        ]"#;
        let records: Vec<HistoryRecord> = serde_json::from_str(json).unwrap();
        let samples = samples_from_records(records);

        // Invalid latitude dropped; rest sorted ascending by timestamp.
        assert_eq!(samples.len(), 2);
        assert!(samples[0].recorded_at < samples[1].recorded_at);
        assert_eq!(samples[0].point.latitude, 51.50);
        assert_eq!(samples[0].accuracy, None);
        assert_eq!(samples[1].accuracy, Some(8.5));
    }

    #[test]
    fn test_live_record_parsing() {
        let json = r#"[{
            "userId": "u1",
            "displayName": "Alice",
            "avatarUrl": null,
            "coords": {"lat": 51.5, "lng": -0.1, "accuracy": 12.0},
            "ts": "2026-08-30T10:00:00Z",
            "sessionEnd": "2026-08-30T09:55:00Z"
        }]"#;
        let records: Vec<LiveRecord> = serde_json::from_str(json).unwrap();
        let locations = locations_from_records(records);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].user_id, "u1");
        assert!(locations[0].session_ended);
        assert_eq!(locations[0].position.accuracy, Some(12.0));
    }

    #[test]
    fn test_point_from_lnglat_flips_axis_order() {
        let p = point_from_lnglat(&[-0.1278, 51.5074]);
        assert_eq!(p.latitude, 51.5074);
        assert_eq!(p.longitude, -0.1278);
    }

    #[test]
    fn test_route_response_parsing() {
        let json = r#"{
            "routes": [
                {"geometry": {"coordinates": [[-0.1278, 51.5074], [-0.1280, 51.5080]]}}
            ]
        }"#;
        let body: RouteResponse = serde_json::from_str(json).unwrap();
        let points: Vec<GeoPoint> = body.routes[0]
            .geometry
            .coordinates
            .iter()
            .map(point_from_lnglat)
            .collect();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0], GeoPoint::new(51.5074, -0.1278));
    }

    #[test]
    fn test_segment_url_uses_lnglat_order() {
        let client = RoutingClient::new("https://router.example.com/").unwrap();
        let url = client.segment_url(GeoPoint::new(51.5, -0.1), GeoPoint::new(51.6, -0.2));
        assert_eq!(
            url,
            "https://router.example.com/route/v1/driving/-0.1,51.5;-0.2,51.6?overview=full&geometries=geojson"
        );
    }
}
