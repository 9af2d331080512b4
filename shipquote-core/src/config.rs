//! Editable pricing configuration, its built-in defaults and its persistence.
//!
//! The stored JSON document is merged over the defaults: objects merge key by
//! key, every other value replaces the default. A store that cannot be read
//! leaves the defaults in place. Updates build a complete new configuration
//! and swap it in, so readers always see a whole table.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::QuoteError;
use crate::model::{
    AreaOverride, DistanceKm, PriceRange, PriceTable, ServiceCode, ServiceDefinition, TimeWindow,
    all_weekdays,
};
use crate::ports::{ConfigStore, ConfigStoreError};
use crate::pricing::{PriceQuote, price};
use crate::resolver::{AreaDistance, DistancePolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Services and distance policy of the store.
pub struct PricingConfig {
    /// Service definitions keyed by code.
    #[serde(default)]
    pub services: BTreeMap<ServiceCode, ServiceDefinition>,
    /// Fallback and sanity rules for resolved distances.
    #[serde(default)]
    pub distance: DistancePolicy,
}

impl PricingConfig {
    /// Merge `document` over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] when the merged document does not fit
    /// the configuration shape.
    pub fn from_document(mut document: Value) -> Result<Self, serde_json::Error> {
        // keys must match the canonical codes before merging
        if let Some(Value::Object(services)) = document.get_mut("services") {
            *services = mem::take(services)
                .into_iter()
                .map(|(code, service)| (String::from(ServiceCode::new(&code)), service))
                .collect();
        }

        let mut merged = serde_json::to_value(Self::default())?;
        merge_documents(&mut merged, document);
        serde_json::from_value(merged)
    }

    /// Load from `store`, falling back to the defaults on any failure.
    #[must_use]
    pub fn load_or_default(store: &dyn ConfigStore) -> Self {
        let document = match store.load() {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("no stored pricing configuration, using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(error = %err, "failed to read pricing configuration, using defaults");
                return Self::default();
            }
        };

        match Self::from_document(document) {
            Ok(config) => {
                for (code, service) in &config.services {
                    if let Err(err) = service.price_table.validate() {
                        warn!(%code, error = %err, "stored price table is malformed");
                    }
                }
                config
            }
            Err(err) => {
                warn!(error = %err, "stored pricing configuration is invalid, using defaults");
                Self::default()
            }
        }
    }

    /// Definition for `code`.
    #[must_use]
    pub fn service(&self, code: &ServiceCode) -> Option<&ServiceDefinition> {
        self.services.get(code)
    }

    /// Definition for `code`, or [`QuoteError::UnknownService`].
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] when the code is not configured.
    pub fn service_mut(&mut self, code: &ServiceCode) -> Result<&mut ServiceDefinition, QuoteError> {
        self.services
            .get_mut(code)
            .ok_or_else(|| QuoteError::UnknownService(code.clone()))
    }

    /// Price service `code` for a destination `distance` away in `area`.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] when the code is not configured.
    pub fn price_for(
        &self,
        code: &ServiceCode,
        distance: DistanceKm,
        area: &str,
    ) -> Result<PriceQuote, QuoteError> {
        self.service(code)
            .map(|service| price(service, distance, area))
            .ok_or_else(|| QuoteError::UnknownService(code.clone()))
    }

    /// Areas with an override in any service, sorted and deduplicated.
    #[must_use]
    pub fn special_zones(&self) -> Vec<String> {
        let mut zones: Vec<String> = self
            .services
            .values()
            .flat_map(|service| service.area_overrides.iter())
            .map(|entry| entry.area.clone())
            .collect();
        zones.sort();
        zones.dedup();
        zones
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            services: default_services(),
            distance: DistancePolicy {
                area_fallbacks: default_area_fallbacks(),
                ..DistancePolicy::default()
            },
        }
    }
}

/// Overlay `overlay` onto `base`: objects merge recursively, anything else replaces.
pub fn merge_documents(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_documents(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// (area, standard price, express price)
const SPECIAL_PRICES: &[(&str, u32, u32)] = &[
    ("providencia", 2500, 3500),
    ("las condes", 3500, 4500),
    ("vitacura", 4000, 5500),
    ("santiago", 3000, 4000),
    ("ñuñoa", 3500, 4500),
    ("la reina", 5000, 6500),
    ("maipú", 7000, 8500),
    ("puente alto", 8000, 9500),
];

const AREA_FALLBACK_KM: &[(&str, f64)] = &[
    ("providencia", 2.0),
    ("las condes", 8.0),
    ("vitacura", 12.0),
    ("santiago", 6.0),
    ("ñuñoa", 7.0),
    ("la reina", 15.0),
    ("maipú", 22.0),
    ("puente alto", 28.0),
    ("la florida", 20.0),
    ("san miguel", 12.0),
    ("la cisterna", 15.0),
    ("macul", 9.0),
    ("peñalolén", 18.0),
    ("huechuraba", 18.0),
    ("quilicura", 22.0),
    ("independencia", 10.0),
    ("recoleta", 12.0),
    ("conchalí", 15.0),
];

fn tiered(prices: [u32; 4], labels: [&str; 4]) -> PriceTable {
    let [near, middle, far, extended] = prices;
    let [near_label, middle_label, far_label, extended_label] = labels;
    PriceTable::from_parts(
        vec![
            PriceRange::new(0.0, Some(10.0), near, near_label),
            PriceRange::new(10.0, Some(15.0), middle, middle_label),
            PriceRange::new(15.0, Some(20.0), far, far_label),
        ],
        PriceRange::new(20.0, None, extended, extended_label),
    )
}

fn default_services() -> BTreeMap<ServiceCode, ServiceDefinition> {
    let standard = ServiceDefinition {
        name: "Envío Estándar".to_owned(),
        description: "Entrega en 2-3 días hábiles en Santiago".to_owned(),
        delivery_time: "2-3 días hábiles".to_owned(),
        enabled: true,
        weekdays: all_weekdays(),
        window: TimeWindow::ALL_DAY,
        price_table: tiered(
            [3000, 4500, 6500, 8000],
            [
                "Zona cercana (hasta 10km)",
                "Zona intermedia (10-15km)",
                "Zona lejana (15-20km)",
                "Zona extendida (+20km)",
            ],
        ),
        area_overrides: SPECIAL_PRICES
            .iter()
            .map(|&(area, standard, _express)| AreaOverride::new(area, standard))
            .collect(),
    };

    let express = ServiceDefinition {
        name: "Envío Express".to_owned(),
        description: "Entrega en 24-48 horas en Santiago".to_owned(),
        delivery_time: "24-48 horas".to_owned(),
        enabled: true,
        weekdays: all_weekdays(),
        window: TimeWindow::ALL_DAY,
        price_table: tiered(
            [4500, 6000, 8000, 10000],
            [
                "Express cercano (hasta 10km)",
                "Express intermedio (10-15km)",
                "Express lejano (15-20km)",
                "Express extendido (+20km)",
            ],
        ),
        area_overrides: SPECIAL_PRICES
            .iter()
            .map(|&(area, _standard, express)| AreaOverride::new(area, express))
            .collect(),
    };

    BTreeMap::from([
        (ServiceCode::new("STANDARD"), standard),
        (ServiceCode::new("EXPRESS"), express),
    ])
}

fn default_area_fallbacks() -> Vec<AreaDistance> {
    AREA_FALLBACK_KM
        .iter()
        .map(|&(area, km)| AreaDistance::new(area, km))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Whether an administrative change reached the configuration store.
pub enum Persistence {
    /// The full configuration was written.
    Saved,
    /// No store is attached; the change lives in memory only.
    InMemoryOnly,
    /// Writing failed; the change is live in memory but may be lost on restart.
    Failed(String),
}

/// Process-wide pricing configuration with atomic replacement.
pub struct ConfigHandle {
    current: RwLock<Arc<PricingConfig>>,
    store: Option<Arc<dyn ConfigStore>>,
    save_lock: Mutex<()>,
}

impl ConfigHandle {
    /// Hold `config` without persistence.
    #[must_use]
    pub fn in_memory(config: PricingConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            store: None,
            save_lock: Mutex::new(()),
        }
    }

    /// Load from `store` (defaults on failure) and persist later changes to it.
    #[must_use]
    pub fn load(store: Arc<dyn ConfigStore>) -> Self {
        let config = PricingConfig::load_or_default(store.as_ref());
        Self {
            current: RwLock::new(Arc::new(config)),
            store: Some(store),
            save_lock: Mutex::new(()),
        }
    }

    /// The configuration as of now. Later updates do not affect the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PricingConfig> {
        Arc::clone(&self.current.read())
    }

    /// Apply `change` to a copy of the configuration and publish it.
    ///
    /// Nothing is published when `change` fails. Persistence is best effort
    /// and reported through the returned [`Persistence`].
    ///
    /// # Errors
    ///
    /// Returns the [`QuoteError`] produced by `change`.
    pub fn update<F>(&self, change: F) -> Result<Persistence, QuoteError>
    where
        F: FnOnce(&mut PricingConfig) -> Result<(), QuoteError>,
    {
        {
            let mut current = self.current.write();
            let mut next = PricingConfig::clone(&current);
            change(&mut next)?;
            *current = Arc::new(next);
        }
        Ok(self.persist())
    }

    fn persist(&self) -> Persistence {
        let Some(store) = &self.store else {
            return Persistence::InMemoryOnly;
        };

        // serialize writers so the file always ends with the newest snapshot
        let _saving = self.save_lock.lock();
        let result = serde_json::to_value(self.snapshot().as_ref())
            .map_err(ConfigStoreError::from)
            .and_then(|document| store.save(&document));

        match result {
            Ok(()) => Persistence::Saved,
            Err(err) => {
                warn!(error = %err, "failed to persist pricing configuration");
                Persistence::Failed(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
/// Configuration store backed by one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first save.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Option<Value>, ConfigStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, document: &Value) -> Result<(), ConfigStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(document)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_tables_are_valid() {
        let config = PricingConfig::default();
        assert_eq!(config.services.len(), 2);
        for (code, service) in &config.services {
            assert_eq!(service.price_table.validate(), Ok(()), "{code} table");
        }
    }

    #[test]
    fn document_merges_over_defaults() {
        let document = json!({
            "services": {
                "EXPRESS": { "enabled": false },
                "TODAY": {
                    "name": "Envío Hoy",
                    "delivery_time": "Mismo día",
                    "window": { "start": "00:01", "end": "18:00" },
                    "price_table": [
                        { "min_km": 0.0, "max_km": 7.0, "price": 3500, "label": "Cercano" },
                        { "min_km": 7.0, "price": 6500, "label": "Lejano" }
                    ]
                }
            },
            "distance": { "fallback_km": 10.0 }
        });

        let config = PricingConfig::from_document(document).expect("valid document");
        let express = config
            .service(&ServiceCode::new("express"))
            .expect("express kept");
        assert!(!express.enabled, "overlay disables express");
        assert_eq!(express.name, "Envío Express", "untouched keys keep defaults");

        let today = config.service(&ServiceCode::new("TODAY")).expect("today added");
        assert!(today.enabled, "enabled defaults to true");
        assert_eq!(today.weekdays.len(), 7, "weekdays default to all");
        assert_eq!(today.window.start.to_string(), "00:01");
        assert_eq!(today.price_table.validate(), Ok(()));

        assert!((config.distance.fallback_km - 10.0).abs() < f64::EPSILON);
        assert!(
            !config.distance.area_fallbacks.is_empty(),
            "area fallbacks keep their defaults"
        );
    }

    #[test]
    fn lower_case_document_keys_merge_over_defaults() {
        let document = json!({ "services": { " express ": { "enabled": false } } });

        let config = PricingConfig::from_document(document).expect("valid document");
        assert_eq!(config.services.len(), 2, "no duplicate service was added");
        let express = config
            .service(&ServiceCode::new("EXPRESS"))
            .expect("express kept");
        assert!(!express.enabled, "overlay reached the default entry");
    }

    #[test]
    fn price_for_rejects_unknown_code() {
        let config = PricingConfig::default();
        let standard = ServiceCode::new("STANDARD");
        let distance = DistanceKm::from_km(3.0);

        let quote = config
            .price_for(&standard, distance, "Ñuñoa")
            .expect("standard is configured");
        let expected = config
            .service(&standard)
            .map(|service| price(service, distance, "Ñuñoa"))
            .expect("standard is configured");
        assert_eq!(quote, expected);

        let missing = config.price_for(&ServiceCode::new("OVERNIGHT"), distance, "Ñuñoa");
        assert!(matches!(missing, Err(QuoteError::UnknownService(code)) if code.as_str() == "OVERNIGHT"));
    }

    #[test]
    fn empty_price_table_is_rejected() {
        let document = json!({ "services": { "STANDARD": { "price_table": [] } } });
        assert!(PricingConfig::from_document(document).is_err(), "empty table");
    }

    #[test]
    fn unreadable_store_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pricing.json");
        fs::write(&path, "{ not json").expect("write garbage");

        let config = PricingConfig::load_or_default(&JsonFileStore::new(&path));
        assert_eq!(config, PricingConfig::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(JsonFileStore::new(dir.path().join("nested/pricing.json")));
        let handle = ConfigHandle::load(Arc::<JsonFileStore>::clone(&store));

        let before = handle.snapshot();
        let outcome = handle
            .update(|config| {
                config.service_mut(&ServiceCode::new("STANDARD"))?.enabled = false;
                Ok(())
            })
            .expect("update applies");
        assert_eq!(outcome, Persistence::Saved);

        let standard = ServiceCode::new("STANDARD");
        assert!(
            before.service(&standard).is_some_and(|service| service.enabled),
            "earlier snapshots are unchanged"
        );

        let reloaded = ConfigHandle::load(store);
        assert!(
            reloaded
                .snapshot()
                .service(&standard)
                .is_some_and(|service| !service.enabled),
            "saved change survives a reload"
        );
    }

    #[test]
    fn failed_change_publishes_nothing() {
        let handle = ConfigHandle::in_memory(PricingConfig::default());
        let result = handle.update(|config| {
            config.distance.fallback_km = 99.0;
            config.service_mut(&ServiceCode::new("MISSING")).map(|_service| ())
        });

        assert!(matches!(result, Err(QuoteError::UnknownService(_))));
        assert!(
            (handle.snapshot().distance.fallback_km - 8.0).abs() < f64::EPSILON,
            "partial change was discarded"
        );
    }

    #[test]
    fn special_zones_are_deduplicated() {
        let zones = PricingConfig::default().special_zones();
        assert_eq!(zones.len(), SPECIAL_PRICES.len());
    }
}
