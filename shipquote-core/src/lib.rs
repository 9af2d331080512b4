//! Core types and quote engine for shipquote, a single-merchant delivery pricing service.

/// Matching of destination areas against configured area keys.
pub mod area;
/// Availability of services within their civil time window.
pub mod availability;
/// Time-based geocode cache.
pub mod cache;
/// Clock sources used by the engine.
pub mod clock;
/// Editable pricing configuration and its persistence.
pub mod config;
/// Caller-visible errors.
pub mod error;
/// Domain models shared by the engine and its providers.
pub mod model;
/// Address normalization heuristics.
pub mod normalize;
/// Bundles of geocoding and routing ports supplied by a provider crate.
pub mod plugin;
/// Traits describing the external collaborators.
pub mod ports;
/// Distance-tier and area-override pricing.
pub mod pricing;
/// Rolling-window request limiter.
pub mod rate_limit;
/// Driving distance resolution with fallback.
pub mod resolver;
/// High-level quote engine facade used by clients.
pub mod service;
/// Process settings read from the environment.
pub mod settings;

pub use error::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
