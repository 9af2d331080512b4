//! Traits describing the external collaborators and shared helper types.

use std::io::Error as IoError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::{Error as JsonError, Value};

use crate::model::{Coordinate, ProviderMeta};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to geocoding and routing backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The call did not finish within its budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// The geocoder returned no candidates.
    #[error("No candidates found for {0:?}")]
    NoCandidates(String),
    /// The router returned no route.
    #[error("No route between origin and destination")]
    NoRoute,
    /// The provider answered with a body we could not interpret.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug)]
/// Errors raised by a configuration store.
pub enum ConfigStoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
    /// The document is not valid JSON or does not fit the configuration shape.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Circle that bounds a geocoding search.
pub struct SearchArea {
    /// Known center of the service area.
    pub center: Coordinate,
    /// Search radius in km.
    pub radius_km: f64,
}

#[derive(Debug, Clone)]
/// Query parameters for forward geocoding.
pub struct GeocodeQuery {
    /// Free-text address.
    pub text: String,
    /// ISO country code hint, e.g. `CL`.
    pub country: Option<String>,
    /// Administrative region hint, e.g. `Región Metropolitana`.
    pub region: Option<String>,
    /// Bounding circle around the service area.
    pub bounds: Option<SearchArea>,
    /// Number of candidates requested.
    pub size: usize,
}

#[async_trait]
/// Forward geocoding backend.
pub trait GeocodePort: Send + Sync {
    /// Metadata describing the provider behind this port.
    fn provider(&self) -> &ProviderMeta;

    /// Resolve a text query to candidate coordinates, best first.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails.
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Coordinate>, PortError>;
}

#[async_trait]
/// Driving route backend.
pub trait RoutePort: Send + Sync {
    /// Metadata describing the provider behind this port.
    fn provider(&self) -> &ProviderMeta;

    /// Driving distance in metres from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or finds no route.
    async fn driving_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<f64, PortError>;
}

/// Persistence for the pricing configuration document.
pub trait ConfigStore: Send + Sync {
    /// Load the stored document, `None` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigStoreError`] when the document cannot be read or parsed.
    fn load(&self) -> Result<Option<Value>, ConfigStoreError>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigStoreError`] when the document cannot be written.
    fn save(&self, document: &Value) -> Result<(), ConfigStoreError>;
}
