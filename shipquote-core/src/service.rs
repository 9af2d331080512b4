//! High-level quote engine combining configuration, distance resolution and pricing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::is_available;
use crate::cache::GeocodeCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigHandle, Persistence, PricingConfig};
use crate::error::QuoteError;
use crate::model::{
    AreaOverride, DistanceKm, PriceRange, PriceTable, Quote, QuoteRequest, QuoteResponse,
    ServiceCode, ServiceDefinition, TimeWindow,
};
use crate::plugin::ProviderPlugin;
use crate::pricing::{PriceQuote, price};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::resolver::DistanceResolver;
use crate::settings::EngineSettings;

#[derive(Debug, Clone, Serialize)]
/// Price of one service in an [`Estimate`].
pub struct ServiceEstimate {
    /// Service code.
    pub service_code: ServiceCode,
    /// Price and zone label.
    pub quote: PriceQuote,
}

#[derive(Debug, Clone, Serialize)]
/// Distance and prices for a destination, ignoring service time windows.
pub struct Estimate {
    /// Store identity.
    pub store: String,
    /// Origin label.
    pub origin: String,
    /// Destination as given.
    pub destination: String,
    /// Resolved or fallback distance.
    pub distance: DistanceKm,
    /// One entry per enabled service.
    pub prices: Vec<ServiceEstimate>,
}

#[derive(Debug, Clone, Serialize)]
/// Listing entry for one service.
pub struct ServiceSummary {
    /// Service code.
    pub code: ServiceCode,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Whether the service would be quoted right now.
    pub available_now: bool,
}

#[derive(Debug, Clone, Serialize)]
/// Services offered by the store.
pub struct ServiceListing {
    /// Store identity.
    pub store: String,
    /// Origin label.
    pub origin: String,
    /// Every configured service in code order.
    pub services: Vec<ServiceSummary>,
    /// Areas with special prices.
    pub special_zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
/// Read-only status of the engine.
pub struct HealthSnapshot {
    /// Store identity.
    pub store: String,
    /// Origin label.
    pub origin: String,
    /// Time since the engine was built.
    pub uptime: Duration,
    /// Accepted quote requests in the trailing minute.
    pub requests_last_minute: usize,
    /// Rate limiter ceiling.
    pub rate_limit: usize,
    /// Geocode cache entries.
    pub cache_size: usize,
    /// Availability of every service right now.
    pub services: Vec<ServiceSummary>,
    /// Instant the snapshot describes.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of an administrative change that was applied in memory.
pub struct AdminOutcome {
    /// Service that changed.
    pub code: ServiceCode,
    /// Whether the change reached the configuration store.
    pub persistence: Persistence,
}

/// Public entry point for quoting deliveries and administering services.
pub struct QuoteEngine {
    config: ConfigHandle,
    resolver: DistanceResolver,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    store_name: String,
    origin_label: String,
    started_at: DateTime<Utc>,
}

impl QuoteEngine {
    /// Engine on the wall clock.
    #[must_use]
    pub fn new(settings: &EngineSettings, plugin: &ProviderPlugin, config: ConfigHandle) -> Self {
        Self::with_clock(settings, plugin, config, Arc::new(SystemClock))
    }

    /// Engine reading time from `clock`, with a fresh cache and limiter.
    #[must_use]
    pub fn with_clock(
        settings: &EngineSettings,
        plugin: &ProviderPlugin,
        config: ConfigHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(GeocodeCache::new());
        let resolver = DistanceResolver::new(
            plugin,
            cache,
            Arc::clone(&clock),
            settings.resolver_settings(),
        );
        Self {
            config,
            resolver,
            limiter: RateLimiter::per_minute(settings.max_requests_per_minute),
            started_at: clock.now(),
            clock,
            timezone: settings.timezone,
            store_name: settings.store_name.clone(),
            origin_label: settings.origin_address.clone(),
        }
    }

    /// Geocode cache used by the resolver.
    #[must_use]
    pub fn cache(&self) -> &GeocodeCache {
        self.resolver.cache()
    }

    /// Current pricing configuration.
    #[must_use]
    pub fn config(&self) -> Arc<PricingConfig> {
        self.config.snapshot()
    }

    /// Admit one request through the rate limiter.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::RateLimited`] when the window is full.
    pub fn admit(&self) -> Result<(), QuoteError> {
        match self.limiter.check(self.clock.now()) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after } => {
                warn!(
                    store = %self.store_name,
                    retry_after_secs = retry_after.as_secs(),
                    "rate limit reached"
                );
                Err(QuoteError::RateLimited { retry_after })
            }
        }
    }

    /// Rate-limited [`QuoteEngine::build_quote`].
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::RateLimited`] when the window is full, otherwise
    /// whatever [`QuoteEngine::build_quote`] returns.
    pub async fn handle_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        self.admit()?;
        self.build_quote(request).await
    }

    /// Quote every selected service that is enabled and available now.
    ///
    /// The distance is resolved once and shared by all services. A filter that
    /// names no enabled service yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::MissingDestination`] when the address or area is blank.
    pub async fn build_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let destination = &request.destination;
        if destination.is_incomplete() {
            return Err(QuoteError::MissingDestination);
        }

        let reference_id = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

        let config = self.config.snapshot();
        let now = self.clock.now();
        let offered: Vec<(&ServiceCode, &ServiceDefinition)> = config
            .services
            .iter()
            .filter(|(code, _service)| {
                request
                    .service
                    .as_ref()
                    .is_none_or(|wanted| wanted == *code)
            })
            .filter(|(_code, service)| is_available(service, now, self.timezone))
            .collect();

        if offered.is_empty() {
            info!(reference = %reference_id, "no service available for request");
            return Ok(self.response(reference_id, None, Vec::new()));
        }

        let area = destination.area.trim();
        let distance = self
            .resolver
            .resolve(&destination.address, area, &config.distance)
            .await;

        let quotes: Vec<Quote> = offered
            .into_iter()
            .map(|(code, service)| {
                let priced = price(service, distance, area);
                let marker = if priced.special { " ⭐" } else { "" };
                Quote {
                    rate_id: Uuid::new_v4(),
                    service_code: code.clone(),
                    service_name: service.name.clone(),
                    price: priced.price,
                    description: format!("{} - {area} ({distance}km){marker}", priced.label),
                    delivery_time: service.delivery_time.clone(),
                    origin: self.origin_label.clone(),
                    special: priced.special,
                }
            })
            .collect();

        info!(
            reference = %reference_id,
            %area,
            %distance,
            quotes = quotes.len(),
            "quote built"
        );
        Ok(self.response(reference_id, Some(distance), quotes))
    }

    /// Rate-limited distance and price of every enabled service, ignoring time windows.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::RateLimited`] when the window is full and
    /// [`QuoteError::MissingDestination`] when the address or area is blank.
    pub async fn estimate(&self, address: &str, area: &str) -> Result<Estimate, QuoteError> {
        self.admit()?;
        if address.trim().is_empty() || area.trim().is_empty() {
            return Err(QuoteError::MissingDestination);
        }

        let config = self.config.snapshot();
        let area = area.trim();
        let distance = self.resolver.resolve(address, area, &config.distance).await;
        let prices = config
            .services
            .iter()
            .filter(|(_code, service)| service.enabled)
            .map(|(code, service)| ServiceEstimate {
                service_code: code.clone(),
                quote: price(service, distance, area),
            })
            .collect();

        Ok(Estimate {
            store: self.store_name.clone(),
            origin: self.origin_label.clone(),
            destination: format!("{}, {area}", address.trim()),
            distance,
            prices,
        })
    }

    /// Every configured service with its availability right now.
    #[must_use]
    pub fn services(&self) -> ServiceListing {
        let config = self.config.snapshot();
        ServiceListing {
            store: self.store_name.clone(),
            origin: self.origin_label.clone(),
            services: self.summaries(&config, self.clock.now()),
            special_zones: config.special_zones(),
        }
    }

    /// Read-only status snapshot.
    #[must_use]
    pub fn status(&self) -> HealthSnapshot {
        let now = self.clock.now();
        let config = self.config.snapshot();
        HealthSnapshot {
            store: self.store_name.clone(),
            origin: self.origin_label.clone(),
            uptime: (now - self.started_at).to_std().unwrap_or_default(),
            requests_last_minute: self.limiter.in_window(now),
            rate_limit: self.limiter.limit(),
            cache_size: self.cache().len(),
            services: self.summaries(&config, now),
            timestamp: now,
        }
    }

    /// Enable or disable a service.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] when the code is not configured.
    pub fn set_enabled(
        &self,
        code: &ServiceCode,
        enabled: bool,
    ) -> Result<AdminOutcome, QuoteError> {
        self.administer(code, "enabled flag", |service| {
            service.enabled = enabled;
            Ok(())
        })
    }

    /// Replace a service's distance tiers.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] for an unknown code and
    /// [`QuoteError::InvalidPriceTable`] when the ranges do not cover `[0, ∞)`
    /// contiguously.
    pub fn replace_price_table(
        &self,
        code: &ServiceCode,
        ranges: Vec<PriceRange>,
    ) -> Result<AdminOutcome, QuoteError> {
        let invalid = |source| QuoteError::InvalidPriceTable {
            code: code.clone(),
            source,
        };
        let table = PriceTable::try_from(ranges).map_err(invalid)?;
        table.validate().map_err(invalid)?;

        self.administer(code, "price table", move |service| {
            service.price_table = table;
            Ok(())
        })
    }

    /// Replace a service's allowed weekdays and time window.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] for an unknown code and
    /// [`QuoteError::InvalidSchedule`] when the window or the weekday list is empty.
    pub fn replace_schedule(
        &self,
        code: &ServiceCode,
        weekdays: Vec<Weekday>,
        window: TimeWindow,
    ) -> Result<AdminOutcome, QuoteError> {
        if !window.is_valid() {
            return Err(QuoteError::InvalidSchedule {
                code: code.clone(),
                reason: format!("window {}-{} is empty", window.start, window.end),
            });
        }
        if weekdays.is_empty() {
            return Err(QuoteError::InvalidSchedule {
                code: code.clone(),
                reason: "no weekday selected".to_owned(),
            });
        }
        let mut weekdays = weekdays;
        weekdays.sort_by_key(Weekday::num_days_from_monday);
        weekdays.dedup();

        self.administer(code, "schedule", move |service| {
            service.weekdays = weekdays;
            service.window = window;
            Ok(())
        })
    }

    /// Replace a service's area overrides.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::UnknownService`] for an unknown code and
    /// [`QuoteError::InvalidOverride`] when an entry has a blank area.
    pub fn replace_area_overrides(
        &self,
        code: &ServiceCode,
        overrides: Vec<AreaOverride>,
    ) -> Result<AdminOutcome, QuoteError> {
        if let Some(blank) = overrides.iter().position(|entry| entry.area.trim().is_empty()) {
            return Err(QuoteError::InvalidOverride {
                code: code.clone(),
                reason: format!("entry {blank} has a blank area"),
            });
        }

        self.administer(code, "area overrides", move |service| {
            service.area_overrides = overrides;
            Ok(())
        })
    }

    fn administer<F>(
        &self,
        code: &ServiceCode,
        what: &str,
        change: F,
    ) -> Result<AdminOutcome, QuoteError>
    where
        F: FnOnce(&mut ServiceDefinition) -> Result<(), QuoteError>,
    {
        let persistence = self
            .config
            .update(|config| change(config.service_mut(code)?))?;
        info!(%code, change = what, ?persistence, "service updated");
        Ok(AdminOutcome {
            code: code.clone(),
            persistence,
        })
    }

    fn summaries(&self, config: &PricingConfig, now: DateTime<Utc>) -> Vec<ServiceSummary> {
        config
            .services
            .iter()
            .map(|(code, service)| ServiceSummary {
                code: code.clone(),
                name: service.name.clone(),
                description: service.description.clone(),
                enabled: service.enabled,
                available_now: is_available(service, now, self.timezone),
            })
            .collect()
    }

    fn response(
        &self,
        reference_id: String,
        distance: Option<DistanceKm>,
        quotes: Vec<Quote>,
    ) -> QuoteResponse {
        QuoteResponse {
            reference_id,
            store: self.store_name.clone(),
            origin: self.origin_label.clone(),
            distance,
            quotes,
        }
    }
}
