//! Provider implementation backed by the OpenRouteService API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use shipquote_core::{
    model::{Coordinate, ProviderId, ProviderMeta},
    plugin::ProviderPlugin,
    ports::{GeocodePort, GeocodeQuery, PortError, RoutePort},
    settings::ProviderSettings,
};

const GEOCODE_PATH: &str = "/geocode/search";
const DIRECTIONS_PATH: &str = "/v2/directions/driving-car";
const GEOCODE_LAYERS: &str = "address,street";

/// Response from /geocode/search (GeoJSON feature collection)
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    // [lon, lat] with an optional elevation
    coordinates: Vec<f64>,
}

/// Request body for /v2/directions/driving-car
#[derive(Debug, Serialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
}

/// Response from /v2/directions/driving-car
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    summary: RouteSummary,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    // absent when origin and destination coincide
    #[serde(default)]
    distance: f64,
}

/// Forward geocoding through OpenRouteService.
pub struct OrsGeocodePort {
    client: Client,
    base_url: String,
    api_key: String,
    meta: ProviderMeta,
}

impl OrsGeocodePort {
    /// Create a geocode port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl GeocodePort for OrsGeocodePort {
    fn provider(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Coordinate>, PortError> {
        let text = query.text.trim();
        if text.is_empty() || query.size == 0 {
            return Ok(Vec::new());
        }

        let size = query.size.to_string();
        let mut req = self
            .client
            .get(format!("{}{GEOCODE_PATH}", self.base_url))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("text", text),
                ("size", size.as_str()),
                ("layers", GEOCODE_LAYERS),
            ]);

        if let Some(country) = query.country.as_deref() {
            req = req.query(&[("boundary.country", country)]);
        }
        if let Some(region) = query.region.as_deref() {
            req = req.query(&[("boundary.region", region)]);
        }
        if let Some(bounds) = query.bounds {
            req = req.query(&[
                ("boundary.circle.lat", bounds.center.lat.to_string()),
                ("boundary.circle.lon", bounds.center.lon.to_string()),
                ("boundary.circle.radius", bounds.radius_km.to_string()),
            ]);
        }

        let collection = fetch_json::<FeatureCollection>(req).await?;

        let candidates: Vec<Coordinate> = collection
            .features
            .into_iter()
            .filter_map(|feature| match feature.geometry.coordinates.as_slice() {
                [lon, lat, ..] => Some(Coordinate::new(*lat, *lon)),
                _ => None,
            })
            .collect();

        debug!(%text, candidates = candidates.len(), "ors geocode response");
        Ok(candidates)
    }
}

/// Driving distances through OpenRouteService.
pub struct OrsRoutePort {
    client: Client,
    base_url: String,
    api_key: String,
    meta: ProviderMeta,
}

impl OrsRoutePort {
    /// Create a route port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl RoutePort for OrsRoutePort {
    fn provider(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn driving_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<f64, PortError> {
        // ORS wants [lon, lat]
        let body = DirectionsRequest {
            coordinates: [[origin.lon, origin.lat], [destination.lon, destination.lat]],
        };

        let req = self
            .client
            .post(format!("{}{DIRECTIONS_PATH}", self.base_url))
            .header("Authorization", &self.api_key)
            .json(&body);

        let directions = fetch_json::<DirectionsResponse>(req).await?;

        let route = directions.routes.into_iter().next().ok_or(PortError::NoRoute)?;
        if !route.summary.distance.is_finite() || route.summary.distance < 0.0 {
            return Err(PortError::Malformed(format!(
                "route distance {}",
                route.summary.distance
            )));
        }

        Ok(route.summary.distance)
    }
}

/// Build the plugin bundle for OpenRouteService.
#[must_use]
pub fn plugin(client: Client, settings: &ProviderSettings) -> ProviderPlugin {
    let geocode_port = Arc::new(OrsGeocodePort::new(client.clone(), settings));
    let route_port = Arc::new(OrsRoutePort::new(client, settings));

    ProviderPlugin {
        meta: provider_meta(),
        geocode_port,
        route_port,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        id: ProviderId(String::from("ors")),
        name: String::from("OpenRouteService"),
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use shipquote_core::ports::SearchArea;

    use super::*;

    fn settings(server: &MockServer) -> ProviderSettings {
        ProviderSettings {
            base_url: server.base_url(),
            api_key: "test-key".to_owned(),
            user_agent: "shipquote-test".to_owned(),
        }
    }

    fn query() -> GeocodeQuery {
        GeocodeQuery {
            text: "avenida providencia 1234, providencia, Santiago, Chile".to_owned(),
            country: Some("CL".to_owned()),
            region: Some("Región Metropolitana".to_owned()),
            bounds: Some(SearchArea {
                center: Coordinate::new(-33.4489, -70.6693),
                radius_km: 40.0,
            }),
            size: 5,
        }
    }

    #[tokio::test]
    async fn geocode_sends_bounds_and_reads_lon_lat() {
        let server = MockServer::start_async().await;
        let geocode_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/geocode/search")
                    .query_param("api_key", "test-key")
                    .query_param("boundary.country", "CL")
                    .query_param("boundary.region", "Región Metropolitana")
                    .query_param("boundary.circle.radius", "40")
                    .query_param("size", "5")
                    .query_param("layers", "address,street");
                then.status(200).json_body(json!({
                    "type": "FeatureCollection",
                    "features": [
                        {"geometry": {"type": "Point", "coordinates": [-70.6109, -33.4263]}},
                        {"geometry": {"type": "Point", "coordinates": [-71.0]}},
                        {"geometry": {"type": "Point", "coordinates": [-70.62, -33.43, 560.0]}}
                    ]
                }));
            })
            .await;

        let port = OrsGeocodePort::new(Client::new(), &settings(&server));
        let candidates = port.geocode(&query()).await.expect("geocode succeeds");

        geocode_mock.assert_async().await;
        assert_eq!(
            candidates,
            vec![
                Coordinate::new(-33.4263, -70.6109),
                Coordinate::new(-33.43, -70.62),
            ]
        );
    }

    #[tokio::test]
    async fn geocode_without_features_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/geocode/search");
                then.status(200).json_body(json!({"type": "FeatureCollection"}));
            })
            .await;

        let port = OrsGeocodePort::new(Client::new(), &settings(&server));
        let candidates = port.geocode(&query()).await.expect("geocode succeeds");

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn geocode_http_error_is_network_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/geocode/search");
                then.status(403);
            })
            .await;

        let port = OrsGeocodePort::new(Client::new(), &settings(&server));
        let err = port.geocode(&query()).await.expect_err("forbidden");

        assert!(matches!(err, PortError::Network(_)));
    }

    #[tokio::test]
    async fn route_posts_lon_lat_pairs_and_returns_meters() {
        let server = MockServer::start_async().await;
        let route_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/directions/driving-car")
                    .header("Authorization", "test-key")
                    .json_body(json!({
                        "coordinates": [[-70.601, -33.428], [-70.6109, -33.4263]]
                    }));
                then.status(200).json_body(json!({
                    "routes": [{"summary": {"distance": 5234.7, "duration": 640.2}}]
                }));
            })
            .await;

        let port = OrsRoutePort::new(Client::new(), &settings(&server));
        let meters = port
            .driving_distance(
                Coordinate::new(-33.428, -70.601),
                Coordinate::new(-33.4263, -70.6109),
            )
            .await
            .expect("route succeeds");

        route_mock.assert_async().await;
        assert!((meters - 5234.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn route_without_routes_is_no_route() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/directions/driving-car");
                then.status(200).json_body(json!({"routes": []}));
            })
            .await;

        let port = OrsRoutePort::new(Client::new(), &settings(&server));
        let err = port
            .driving_distance(
                Coordinate::new(-33.428, -70.601),
                Coordinate::new(-33.4263, -70.6109),
            )
            .await
            .expect_err("no route");

        assert!(matches!(err, PortError::NoRoute));
    }

    #[test]
    fn plugin_bundles_both_ports() {
        let settings = ProviderSettings {
            base_url: "http://localhost".to_owned(),
            api_key: String::new(),
            user_agent: String::new(),
        };
        let plugin = plugin(Client::new(), &settings);

        assert_eq!(plugin.meta.id, ProviderId("ors".to_owned()));
        assert_eq!(plugin.geocode_port.provider().name, "OpenRouteService");
        assert_eq!(plugin.route_port.provider().name, "OpenRouteService");
    }
}
