//! Driving distance resolution from the store's origin.
//!
//! [`DistanceResolver::resolve`] never fails: geocoding misses, routing
//! errors, timeouts and implausible distances all degrade to the fallback
//! distance of the [`DistancePolicy`], and the cause is logged.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::area::match_area;
use crate::cache::GeocodeCache;
use crate::clock::Clock;
use crate::model::{Coordinate, DistanceKm};
use crate::normalize::{NormalizedAddress, normalize};
use crate::plugin::ProviderPlugin;
use crate::ports::{GeocodePort, GeocodeQuery, PortError, RoutePort, SearchArea};

/// Distance used when resolution fails and no area entry matches.
pub const DEFAULT_FALLBACK_KM: f64 = 8.0;
/// Routed distances above this are treated as geocoding mistakes.
pub const DEFAULT_MAX_PLAUSIBLE_KM: f64 = 50.0;
/// Candidates requested from the geocoder.
pub const DEFAULT_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Estimated distance for an area, used when resolution fails.
pub struct AreaDistance {
    /// Area key.
    pub area: String,
    /// Estimated distance in km from the origin.
    pub km: f64,
}

impl AreaDistance {
    /// Create an entry.
    #[must_use]
    pub fn new<A: Into<String>>(area: A, km: f64) -> Self {
        Self {
            area: area.into(),
            km,
        }
    }
}

const fn default_fallback_km() -> f64 {
    DEFAULT_FALLBACK_KM
}

const fn default_max_plausible_km() -> f64 {
    DEFAULT_MAX_PLAUSIBLE_KM
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Sanity bound and fallback rules for resolved distances.
pub struct DistancePolicy {
    /// Distance used when nothing better is known.
    #[serde(default = "default_fallback_km")]
    pub fallback_km: f64,
    /// Larger routed distances are discarded.
    #[serde(default = "default_max_plausible_km")]
    pub max_plausible_km: f64,
    /// Per-area estimates consulted before `fallback_km`.
    #[serde(default)]
    pub area_fallbacks: Vec<AreaDistance>,
}

impl DistancePolicy {
    /// Fallback distance for `area`.
    #[must_use]
    pub fn fallback_for(&self, area: &str) -> DistanceKm {
        let km = match_area(&self.area_fallbacks, area).map_or(self.fallback_km, |entry| entry.km);
        DistanceKm::from_km(km)
    }

    /// True when `distance` is within the sanity bound.
    #[must_use]
    pub fn is_plausible(&self, distance: DistanceKm) -> bool {
        distance.km() <= self.max_plausible_km
    }
}

impl Default for DistancePolicy {
    fn default() -> Self {
        Self {
            fallback_km: DEFAULT_FALLBACK_KM,
            max_plausible_km: DEFAULT_MAX_PLAUSIBLE_KM,
            area_fallbacks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
/// Fixed parameters of the resolver.
pub struct ResolverSettings {
    /// Store location every route starts from.
    pub origin: Coordinate,
    /// Circle bounding geocoder searches; its center also ranks candidates.
    pub search_area: SearchArea,
    /// ISO country hint for the geocoder.
    pub country: String,
    /// Appended to every geocoder query, e.g. `Santiago, Chile`.
    pub region_suffix: String,
    /// Administrative region hint for the geocoder.
    pub boundary_region: String,
    /// Candidates requested per geocoding call.
    pub candidates: usize,
    /// Budget for one geocoding call.
    pub geocode_timeout: Duration,
    /// Budget for one routing call.
    pub route_timeout: Duration,
}

#[derive(thiserror::Error, Debug)]
/// Why a distance could not be resolved.
pub enum ResolutionFailure {
    /// The address could not be geocoded.
    #[error("geocoding failed: {0}")]
    Geocode(#[source] PortError),
    /// The route could not be computed.
    #[error("routing failed: {0}")]
    Route(#[source] PortError),
    /// The routed distance exceeds the sanity bound.
    #[error("implausible distance of {0} km")]
    Implausible(DistanceKm),
}

/// Candidate nearest to `center` in coordinate space.
#[must_use]
pub fn pick_nearest(candidates: &[Coordinate], center: Coordinate) -> Option<Coordinate> {
    candidates.iter().copied().min_by(|left, right| {
        left.planar_distance(center)
            .total_cmp(&right.planar_distance(center))
    })
}

/// Turns a destination address into a driving distance from the origin.
pub struct DistanceResolver {
    geocode_port: Arc<dyn GeocodePort>,
    route_port: Arc<dyn RoutePort>,
    cache: Arc<GeocodeCache>,
    clock: Arc<dyn Clock>,
    settings: ResolverSettings,
}

impl DistanceResolver {
    /// Build a resolver over the provider's ports.
    #[must_use]
    pub fn new(
        plugin: &ProviderPlugin,
        cache: Arc<GeocodeCache>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            geocode_port: Arc::clone(&plugin.geocode_port),
            route_port: Arc::clone(&plugin.route_port),
            cache,
            clock,
            settings,
        }
    }

    /// The cache shared with this resolver.
    #[must_use]
    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Distance to `address` in `area`, or the policy fallback on any failure.
    pub async fn resolve(&self, address: &str, area: &str, policy: &DistancePolicy) -> DistanceKm {
        match self.try_resolve(address, area, policy).await {
            Ok(distance) => distance,
            Err(failure) => {
                let fallback = policy.fallback_for(area);
                warn!(
                    %address,
                    %area,
                    %fallback,
                    error = %failure,
                    "distance resolution failed, using fallback"
                );
                fallback
            }
        }
    }

    /// Distance to `address` in `area`, surfacing the failure cause.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionFailure`] when geocoding or routing fails, times
    /// out, or the routed distance is implausible.
    pub async fn try_resolve(
        &self,
        address: &str,
        area: &str,
        policy: &DistancePolicy,
    ) -> Result<DistanceKm, ResolutionFailure> {
        let normalized = normalize(address, area);
        let destination = self
            .locate(&normalized)
            .await
            .map_err(ResolutionFailure::Geocode)?;

        let meters = timeout(
            self.settings.route_timeout,
            self.route_port
                .driving_distance(self.settings.origin, destination),
        )
        .await
        .map_err(|_elapsed| ResolutionFailure::Route(PortError::Timeout(self.settings.route_timeout)))?
        .map_err(ResolutionFailure::Route)?;

        let distance = DistanceKm::from_meters(meters);
        debug!(
            provider = %self.route_port.provider().name,
            destination = %normalized,
            %distance,
            "route resolved"
        );

        if policy.is_plausible(distance) {
            Ok(distance)
        } else {
            Err(ResolutionFailure::Implausible(distance))
        }
    }

    async fn locate(&self, normalized: &NormalizedAddress) -> Result<Coordinate, PortError> {
        let key = normalized.to_string();
        let now = self.clock.now();
        let evicted = self.cache.sweep(now);
        if evicted > 0 {
            debug!(evicted, "expired geocode entries dropped");
        }
        if let Some(hit) = self.cache.get(&key, now) {
            debug!(address = %key, "geocode cache hit");
            return Ok(hit);
        }

        let query = GeocodeQuery {
            text: normalized.query(&self.settings.region_suffix),
            country: Some(self.settings.country.clone()).filter(|country| !country.is_empty()),
            region: Some(self.settings.boundary_region.clone()).filter(|region| !region.is_empty()),
            bounds: Some(self.settings.search_area),
            size: self.settings.candidates,
        };

        let candidates = timeout(
            self.settings.geocode_timeout,
            self.geocode_port.geocode(&query),
        )
        .await
        .map_err(|_elapsed| PortError::Timeout(self.settings.geocode_timeout))??;

        let chosen = pick_nearest(&candidates, self.settings.search_area.center)
            .ok_or_else(|| PortError::NoCandidates(query.text.clone()))?;

        debug!(
            provider = %self.geocode_port.provider().name,
            address = %key,
            candidates = candidates.len(),
            lat = chosen.lat,
            lon = chosen.lon,
            "address geocoded"
        );
        self.cache.put(&key, chosen, self.clock.now());
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_candidate_to_center_wins() {
        let center = Coordinate::new(-33.45, -70.66);
        let candidates = [
            Coordinate::new(-36.82, -73.05),
            Coordinate::new(-33.44, -70.65),
            Coordinate::new(-33.60, -70.70),
        ];
        assert_eq!(
            pick_nearest(&candidates, center),
            Some(Coordinate::new(-33.44, -70.65))
        );
        assert_eq!(pick_nearest(&[], center), None);
    }

    #[test]
    fn area_fallback_precedes_constant() {
        let policy = DistancePolicy {
            area_fallbacks: vec![AreaDistance::new("maipú", 22.0)],
            ..DistancePolicy::default()
        };
        assert!((policy.fallback_for("Maipú").km() - 22.0).abs() < f64::EPSILON);
        assert!((policy.fallback_for("Quilicura").km() - DEFAULT_FALLBACK_KM).abs() < f64::EPSILON);
    }

    #[test]
    fn plausibility_bound_is_inclusive() {
        let policy = DistancePolicy::default();
        assert!(policy.is_plausible(DistanceKm::from_km(50.0)), "50 km is allowed");
        assert!(!policy.is_plausible(DistanceKm::from_km(50.01)), "above 50 km is not");
    }
}
