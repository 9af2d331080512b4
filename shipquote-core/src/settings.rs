//! Process settings read from environment variables.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::{America, Tz};

use crate::model::Coordinate;
use crate::ports::SearchArea;
use crate::rate_limit::DEFAULT_MAX_REQUESTS_PER_MINUTE;
use crate::resolver::{DEFAULT_CANDIDATES, ResolverSettings};

/// Civil timezone used when `STORE_TIMEZONE` is not set.
pub const DEFAULT_TIMEZONE: Tz = America::Santiago;

#[derive(thiserror::Error, Debug)]
/// A setting is present but unusable.
pub enum SettingsError {
    /// The value could not be parsed.
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

#[derive(Debug, Clone)]
/// Connection details of the geocoding/routing provider.
pub struct ProviderSettings {
    /// API root, without trailing slash.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// `User-Agent` header.
    pub user_agent: String,
}

#[derive(Debug, Clone)]
/// Everything the engine needs that is not part of the editable pricing document.
pub struct EngineSettings {
    /// Store identity reported in responses.
    pub store_name: String,
    /// Human-readable origin address.
    pub origin_address: String,
    /// Origin coordinate every route starts from.
    pub origin: Coordinate,
    /// Circle bounding geocoder searches.
    pub search_area: SearchArea,
    /// ISO country hint for the geocoder.
    pub country: String,
    /// Appended to geocoder queries.
    pub region_suffix: String,
    /// Administrative region the geocoder is restricted to.
    pub boundary_region: String,
    /// Rate limiter ceiling per 60 s.
    pub max_requests_per_minute: usize,
    /// Budget for one geocoding call.
    pub geocode_timeout: Duration,
    /// Budget for one routing call.
    pub route_timeout: Duration,
    /// Civil timezone of the store.
    pub timezone: Tz,
    /// Location of the pricing JSON document.
    pub pricing_config_path: PathBuf,
    /// Provider connection details.
    pub provider: ProviderSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_name: "shipquote".to_owned(),
            origin_address: "Amapolas 3959, Providencia, Santiago".to_owned(),
            origin: Coordinate::new(-33.4280, -70.6010),
            search_area: SearchArea {
                center: Coordinate::new(-33.4489, -70.6693),
                radius_km: 40.0,
            },
            country: "CL".to_owned(),
            region_suffix: "Santiago, Chile".to_owned(),
            boundary_region: "Región Metropolitana".to_owned(),
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            geocode_timeout: Duration::from_millis(8000),
            route_timeout: Duration::from_millis(10_000),
            timezone: DEFAULT_TIMEZONE,
            pricing_config_path: PathBuf::from("pricing.json"),
            provider: ProviderSettings {
                base_url: "https://api.openrouteservice.org".to_owned(),
                api_key: String::new(),
                user_agent: "shipquote/0.1".to_owned(),
            },
        }
    }
}

impl EngineSettings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when a value is set but unparsable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
        };

        Ok(Self {
            store_name: text("STORE_NAME", defaults.store_name),
            origin_address: text("ORIGIN_ADDRESS", defaults.origin_address),
            origin: Coordinate::new(
                parsed(&lookup, "ORIGIN_LAT", defaults.origin.lat)?,
                parsed(&lookup, "ORIGIN_LON", defaults.origin.lon)?,
            ),
            search_area: SearchArea {
                center: Coordinate::new(
                    parsed(&lookup, "SEARCH_CENTER_LAT", defaults.search_area.center.lat)?,
                    parsed(&lookup, "SEARCH_CENTER_LON", defaults.search_area.center.lon)?,
                ),
                radius_km: parsed(&lookup, "SEARCH_RADIUS_KM", defaults.search_area.radius_km)?,
            },
            country: text("GEOCODE_COUNTRY", defaults.country),
            region_suffix: text("GEOCODE_REGION", defaults.region_suffix),
            boundary_region: text("GEOCODE_BOUNDARY_REGION", defaults.boundary_region),
            max_requests_per_minute: parsed(
                &lookup,
                "MAX_REQUESTS_PER_MINUTE",
                defaults.max_requests_per_minute,
            )?,
            geocode_timeout: Duration::from_millis(parsed(&lookup, "GEOCODE_TIMEOUT_MS", 8000_u64)?),
            route_timeout: Duration::from_millis(parsed(&lookup, "ROUTE_TIMEOUT_MS", 10_000_u64)?),
            timezone: parsed(&lookup, "STORE_TIMEZONE", defaults.timezone)?,
            pricing_config_path: PathBuf::from(text(
                "PRICING_CONFIG_PATH",
                defaults.pricing_config_path.display().to_string(),
            )),
            provider: ProviderSettings {
                base_url: text("ORS_BASE_URL", defaults.provider.base_url)
                    .trim_end_matches('/')
                    .to_owned(),
                api_key: text("ORS_API_KEY", defaults.provider.api_key),
                user_agent: text("HTTP_USER_AGENT", defaults.provider.user_agent),
            },
        })
    }

    /// Parameters for the distance resolver.
    #[must_use]
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            origin: self.origin,
            search_area: self.search_area,
            country: self.country.clone(),
            region_suffix: self.region_suffix.clone(),
            boundary_region: self.boundary_region.clone(),
            candidates: DEFAULT_CANDIDATES,
            geocode_timeout: self.geocode_timeout,
            route_timeout: self.route_timeout,
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };
    raw.trim().parse().map_err(|err: T::Err| SettingsError::Invalid {
        key,
        value: raw.clone(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|&(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_keep_defaults() {
        let settings = EngineSettings::from_lookup(lookup_from(&[])).expect("defaults parse");
        assert_eq!(settings.max_requests_per_minute, 35);
        assert_eq!(settings.timezone, DEFAULT_TIMEZONE);
        assert_eq!(settings.geocode_timeout, Duration::from_secs(8));
        assert_eq!(settings.route_timeout, Duration::from_secs(10));
        assert_eq!(
            settings.resolver_settings().boundary_region,
            "Región Metropolitana"
        );
    }

    #[test]
    fn values_override_defaults() {
        let settings = EngineSettings::from_lookup(lookup_from(&[
            ("MAX_REQUESTS_PER_MINUTE", "10"),
            ("STORE_TIMEZONE", "America/Lima"),
            ("ORS_BASE_URL", "http://localhost:8080/"),
            ("ORIGIN_LAT", " -33.5 "),
            ("GEOCODE_BOUNDARY_REGION", "Región de Valparaíso"),
        ]))
        .expect("values parse");
        assert_eq!(settings.max_requests_per_minute, 10);
        assert_eq!(settings.timezone, America::Lima);
        assert_eq!(settings.provider.base_url, "http://localhost:8080");
        assert!((settings.origin.lat + 33.5).abs() < f64::EPSILON);
        assert_eq!(settings.boundary_region, "Región de Valparaíso");
    }

    #[test]
    fn malformed_value_is_reported() {
        let err = EngineSettings::from_lookup(lookup_from(&[("ROUTE_TIMEOUT_MS", "soon")]))
            .expect_err("not a number");
        assert!(err.to_string().contains("ROUTE_TIMEOUT_MS"), "{err}");
    }
}
