//! Domain data structures for destinations, services, price tables and quotes.

use std::fmt;
use std::iter;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minutes in a civil day; the largest valid [`ClockTime`].
pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Latitude/longitude pair in decimal degrees.
pub struct Coordinate {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Euclidean distance in coordinate space. Only meaningful for ranking nearby points.
    #[must_use]
    pub fn planar_distance(self, other: Self) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
/// Non-negative distance in kilometres, rounded to two decimals.
pub struct DistanceKm(f64);

impl DistanceKm {
    /// Round `km` to two decimals, clamping negatives and NaN to zero.
    #[must_use]
    pub fn from_km(km: f64) -> Self {
        let clamped = km.max(0.0);
        Self((clamped * 100.0).round() / 100.0)
    }

    /// Convert a routing distance in metres.
    #[must_use]
    pub fn from_meters(meters: f64) -> Self {
        Self::from_km(meters / 1000.0)
    }

    /// Raw kilometre value.
    #[must_use]
    pub const fn km(self) -> f64 {
        self.0
    }
}

impl fmt::Display for DistanceKm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Identifier of a shipping service, e.g. `STANDARD`.
pub struct ServiceCode(pub String);

impl ServiceCode {
    /// Build a code, trimming and upper-casing the input.
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    /// Borrow the code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ServiceCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<ServiceCode> for String {
    fn from(code: ServiceCode) -> Self {
        code.0
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a geocoding/routing provider.
pub struct ProviderId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing an upstream provider.
pub struct ProviderMeta {
    /// Unique identifier.
    pub id: ProviderId,
    /// Display name used in logs and status output.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Destination of a delivery.
pub struct Destination {
    /// Street and number, free text.
    pub address: String,
    /// Commune or municipality.
    pub area: String,
}

impl Destination {
    /// Construct a destination.
    #[must_use]
    pub fn new<A: Into<String>, R: Into<String>>(address: A, area: R) -> Self {
        Self {
            address: address.into(),
            area: area.into(),
        }
    }

    /// True when either the address or the area is blank.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.address.trim().is_empty() || self.area.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Contiguous distance bracket with a flat price.
pub struct PriceRange {
    /// Lower bound in km, inclusive.
    pub min_km: f64,
    /// Upper bound in km, exclusive. `None` means unbounded.
    #[serde(default)]
    pub max_km: Option<f64>,
    /// Price in the store currency's minor-free unit (CLP).
    pub price: u32,
    /// Human-readable zone label.
    pub label: String,
}

impl PriceRange {
    /// Create a range.
    #[must_use]
    pub fn new<L: Into<String>>(min_km: f64, max_km: Option<f64>, price: u32, label: L) -> Self {
        Self {
            min_km,
            max_km,
            price,
            label: label.into(),
        }
    }

    /// Half-open containment: `min <= d < max`.
    #[must_use]
    pub fn contains(&self, distance: DistanceKm) -> bool {
        let km = distance.km();
        km >= self.min_km && self.max_km.is_none_or(|max| km < max)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Reasons a price table fails the coverage invariant.
pub enum TableError {
    /// The table has no ranges.
    #[error("price table is empty")]
    Empty,
    /// The first range does not start at 0 km.
    #[error("first range must start at 0 km")]
    DoesNotStartAtZero,
    /// A range has `max <= min`.
    #[error("range {index} has an upper bound not above its lower bound")]
    Inverted {
        /// Position of the offending range.
        index: usize,
    },
    /// A range does not start where the previous one ended.
    #[error("range {index} does not start where the previous range ends")]
    Gap {
        /// Position of the offending range.
        index: usize,
    },
    /// A range other than the last one is unbounded.
    #[error("range {index} is unbounded but is not the last range")]
    UnboundedInner {
        /// Position of the offending range.
        index: usize,
    },
    /// The last range has an upper bound.
    #[error("last range must be unbounded")]
    BoundedLast,
}

const BOUND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriceRange>", into = "Vec<PriceRange>")]
/// Ordered, non-empty list of price ranges for one service.
pub struct PriceTable {
    leading: Vec<PriceRange>,
    last: PriceRange,
}

impl PriceTable {
    /// Build from the leading ranges and the final range.
    #[must_use]
    pub fn from_parts(leading: Vec<PriceRange>, last: PriceRange) -> Self {
        Self { leading, last }
    }

    /// Iterate the ranges in order.
    pub fn ranges(&self) -> impl Iterator<Item = &PriceRange> {
        self.leading.iter().chain(iter::once(&self.last))
    }

    /// The final range, used when nothing else matches.
    #[must_use]
    pub fn last(&self) -> &PriceRange {
        &self.last
    }

    /// First range containing `distance`, or the last range for malformed tables.
    #[must_use]
    pub fn lookup(&self, distance: DistanceKm) -> &PriceRange {
        self.ranges()
            .find(|range| range.contains(distance))
            .unwrap_or(&self.last)
    }

    /// Check that the table starts at zero, is contiguous and ends unbounded.
    ///
    /// # Errors
    ///
    /// Returns the first [`TableError`] found, scanning in order.
    pub fn validate(&self) -> Result<(), TableError> {
        let mut expected_min = 0.0_f64;
        let count = self.leading.len() + 1;
        for (index, range) in self.ranges().enumerate() {
            if (range.min_km - expected_min).abs() > BOUND_EPSILON {
                return Err(if index == 0 {
                    TableError::DoesNotStartAtZero
                } else {
                    TableError::Gap { index }
                });
            }
            match range.max_km {
                Some(max) if max <= range.min_km => return Err(TableError::Inverted { index }),
                Some(_) if index + 1 == count => return Err(TableError::BoundedLast),
                Some(max) => expected_min = max,
                None if index + 1 < count => return Err(TableError::UnboundedInner { index }),
                None => {}
            }
        }
        Ok(())
    }
}

impl TryFrom<Vec<PriceRange>> for PriceTable {
    type Error = TableError;

    fn try_from(mut ranges: Vec<PriceRange>) -> Result<Self, Self::Error> {
        let last = ranges.pop().ok_or(TableError::Empty)?;
        Ok(Self {
            leading: ranges,
            last,
        })
    }
}

impl From<PriceTable> for Vec<PriceRange> {
    fn from(table: PriceTable) -> Self {
        let mut ranges = table.leading;
        ranges.push(table.last);
        ranges
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Area-specific price that bypasses the distance tiers.
pub struct AreaOverride {
    /// Area key, matched case-insensitively.
    pub area: String,
    /// Flat price for the area.
    pub price: u32,
}

impl AreaOverride {
    /// Create an override.
    #[must_use]
    pub fn new<A: Into<String>>(area: A, price: u32) -> Self {
        Self {
            area: area.into(),
            price,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid time of day {0:?}, expected HH:MM between 00:00 and 24:00")]
/// A time-of-day string could not be parsed.
pub struct ClockTimeError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Time of day as minutes since midnight; `24:00` is allowed as an end bound.
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight at the start of the day.
    pub const START_OF_DAY: Self = Self(0);
    /// Midnight at the end of the day.
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Build from hour and minute, `None` when out of range.
    #[must_use]
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        (minute < 60 && total <= MINUTES_PER_DAY).then_some(Self(total))
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = ClockTimeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ClockTimeError(text.to_owned());
        let (hour, minute) = text.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u16>().map_err(|_parse| invalid())?;
        let minute = minute.parse::<u16>().map_err(|_parse| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockTimeError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Half-open time-of-day window `[start, end)` within one civil day.
pub struct TimeWindow {
    /// First minute the service is offered.
    pub start: ClockTime,
    /// First minute the service is no longer offered.
    pub end: ClockTime,
}

impl TimeWindow {
    /// The whole day, `00:00`–`24:00`.
    pub const ALL_DAY: Self = Self {
        start: ClockTime::START_OF_DAY,
        end: ClockTime::END_OF_DAY,
    };

    /// Create a window.
    #[must_use]
    pub const fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// True when `minute` (since midnight) falls inside the window.
    #[must_use]
    pub fn contains(self, minute: u16) -> bool {
        self.start.minutes() <= minute && minute < self.end.minutes()
    }

    /// A window is usable when it starts before it ends.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.start < self.end
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::ALL_DAY
    }
}

/// All seven weekdays, Monday first.
#[must_use]
pub fn all_weekdays() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

const fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A shipping service the store offers.
pub struct ServiceDefinition {
    /// Display name.
    pub name: String,
    /// Longer description shown in service listings.
    #[serde(default)]
    pub description: String,
    /// Delivery-time description copied into every quote.
    pub delivery_time: String,
    /// Disabled services are never quoted.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Weekdays on which the service may be offered.
    #[serde(default = "all_weekdays")]
    pub weekdays: Vec<Weekday>,
    /// Time-of-day window in the store's civil timezone.
    #[serde(default)]
    pub window: TimeWindow,
    /// Distance tiers.
    pub price_table: PriceTable,
    /// Per-area prices that win over the tiers.
    #[serde(default)]
    pub area_overrides: Vec<AreaOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Inbound request to quote a delivery.
pub struct QuoteRequest {
    /// Caller reference echoed back as the response reference id.
    #[serde(default)]
    pub reference: Option<String>,
    /// Where the parcel goes.
    pub destination: Destination,
    /// Restrict the quote to a single service.
    #[serde(default)]
    pub service: Option<ServiceCode>,
}

impl QuoteRequest {
    /// Quote every service for the destination.
    #[must_use]
    pub fn new<A: Into<String>, R: Into<String>>(address: A, area: R) -> Self {
        Self {
            reference: None,
            destination: Destination::new(address, area),
            service: None,
        }
    }

    /// Restrict the quote to one service.
    #[must_use]
    pub fn with_service(mut self, code: ServiceCode) -> Self {
        self.service = Some(code);
        self
    }

    /// Attach a caller reference.
    #[must_use]
    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Price offered for one service.
pub struct Quote {
    /// Fresh correlation id for this rate.
    pub rate_id: Uuid,
    /// Service the rate belongs to.
    pub service_code: ServiceCode,
    /// Service display name.
    pub service_name: String,
    /// Price in CLP.
    pub price: u32,
    /// Zone label, destination area and distance.
    pub description: String,
    /// Delivery-time description of the service.
    pub delivery_time: String,
    /// Origin label of the store.
    pub origin: String,
    /// True when an area override set the price.
    pub special: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Result of a quote request.
pub struct QuoteResponse {
    /// Caller reference, or a generated one.
    pub reference_id: String,
    /// Store identity.
    pub store: String,
    /// Origin label.
    pub origin: String,
    /// Distance used for pricing; absent when no service was priced.
    pub distance: Option<DistanceKm>,
    /// One quote per offered service, in service code order.
    pub quotes: Vec<Quote>,
}
