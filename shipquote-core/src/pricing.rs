//! Price lookup for a service: area overrides first, then distance tiers.

use serde::{Deserialize, Serialize};

use crate::area::match_area;
use crate::model::{DistanceKm, ServiceDefinition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Price and zone label for one service.
pub struct PriceQuote {
    /// Price in CLP.
    pub price: u32,
    /// Zone label or special-rate label.
    pub label: String,
    /// True when an area override set the price.
    pub special: bool,
}

/// Price `service` for a destination `distance` away in `area`.
#[must_use]
pub fn price(service: &ServiceDefinition, distance: DistanceKm, area: &str) -> PriceQuote {
    if let Some(area_override) = match_area(&service.area_overrides, area) {
        return PriceQuote {
            price: area_override.price,
            label: format!("Tarifa especial {}", area.trim()),
            special: true,
        };
    }

    let range = service.price_table.lookup(distance);
    PriceQuote {
        price: range.price,
        label: range.label.clone(),
        special: false,
    }
}
