//! Bundle of ports implementing one upstream provider.

use std::sync::Arc;

use crate::model::ProviderMeta;
use crate::ports::{GeocodePort, RoutePort};

/// Collection of ports implementing geocoding and routing for a provider.
pub struct ProviderPlugin {
    /// Static metadata describing the provider.
    pub meta: ProviderMeta,
    /// Implementation for forward geocoding.
    pub geocode_port: Arc<dyn GeocodePort>,
    /// Implementation for driving distances.
    pub route_port: Arc<dyn RoutePort>,
}
