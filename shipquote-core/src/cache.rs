//! Geocode cache keyed by normalized address text.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::model::Coordinate;

/// Entries live this many hours.
pub const GEOCODE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    coordinate: Coordinate,
    created_at: DateTime<Utc>,
}

/// Coordinates of previously geocoded addresses, expiring after a fixed TTL.
///
/// Only successful lookups are stored. Expired entries are removed when read
/// and by [`GeocodeCache::sweep`].
#[derive(Debug)]
pub struct GeocodeCache {
    ttl: TimeDelta,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl GeocodeCache {
    /// Cache with the standard 24 hour TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(TimeDelta::hours(GEOCODE_TTL_HOURS))
    }

    /// Cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Coordinate for `key` if it was stored less than one TTL before `now`.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Coordinate> {
        let mut entries = self.entries.lock();
        let entry = *entries.get(key)?;
        if now - entry.created_at < self.ttl {
            return Some(entry.coordinate);
        }
        entries.remove(key);
        None
    }

    /// Store `coordinate` for `key`, replacing any previous entry.
    pub fn put(&self, key: &str, coordinate: Coordinate, now: DateTime<Utc>) {
        self.entries.lock().insert(
            key.to_owned(),
            CacheEntry {
                coordinate,
                created_at: now,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_key, entry| now - entry.created_at < self.ttl);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until the next sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn returns_entry_just_before_expiry() {
        let cache = GeocodeCache::new();
        let point = Coordinate::new(-33.43, -70.61);
        cache.put("providencia 100, providencia", point, start());

        let almost = start() + TimeDelta::hours(23) + TimeDelta::minutes(59);
        assert_eq!(
            cache.get("providencia 100, providencia", almost),
            Some(point),
            "entry younger than the TTL must be served"
        );
    }

    #[test]
    fn expired_entry_is_absent_and_evicted() {
        let cache = GeocodeCache::new();
        cache.put("a", Coordinate::new(1.0, 1.0), start());

        let later = start() + TimeDelta::hours(24);
        assert_eq!(cache.get("a", later), None, "expired entry must not be served");
        assert!(cache.is_empty(), "expired entry must be removed on read");
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = GeocodeCache::new();
        cache.put("old", Coordinate::new(1.0, 1.0), start());
        cache.put(
            "fresh",
            Coordinate::new(2.0, 2.0),
            start() + TimeDelta::hours(20),
        );

        let evicted = cache.sweep(start() + TimeDelta::hours(25));
        assert_eq!(evicted, 1, "only the old entry is expired");
        assert_eq!(cache.len(), 1, "fresh entry survives the sweep");
    }

    #[test]
    fn later_write_wins() {
        let cache = GeocodeCache::new();
        cache.put("a", Coordinate::new(1.0, 1.0), start());
        cache.put("a", Coordinate::new(3.0, 3.0), start());
        assert_eq!(
            cache.get("a", start()),
            Some(Coordinate::new(3.0, 3.0)),
            "last write replaces the entry"
        );
    }
}
