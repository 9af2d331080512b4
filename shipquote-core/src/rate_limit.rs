//! Rolling-window limiter protecting the upstream geocoding and routing quota.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Accepted requests per window unless configured otherwise.
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: usize = 35;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of a rate limit check.
pub enum RateDecision {
    /// The request may proceed.
    Allowed {
        /// Requests still available in the current window.
        remaining: usize,
    },
    /// The request is rejected.
    Limited {
        /// Time until the oldest accepted request leaves the window.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// True for [`RateDecision::Allowed`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Accepts at most `limit` requests in any trailing window.
///
/// Timestamps of accepted requests are appended in call order and purged from
/// the front, so the queue stays sorted without explicit sorting.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: TimeDelta,
    accepted: Mutex<VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    /// `limit` requests per 60 seconds.
    #[must_use]
    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, TimeDelta::seconds(60))
    }

    /// `limit` requests per `window`.
    #[must_use]
    pub fn new(limit: usize, window: TimeDelta) -> Self {
        Self {
            limit,
            window,
            accepted: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Configured ceiling.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Decide whether a request arriving at `now` may proceed, recording it if so.
    pub fn check(&self, now: DateTime<Utc>) -> RateDecision {
        let cutoff = now - self.window;
        let mut accepted = self.accepted.lock();
        while accepted.front().is_some_and(|oldest| *oldest < cutoff) {
            accepted.pop_front();
        }

        if accepted.len() < self.limit {
            accepted.push_back(now);
            return RateDecision::Allowed {
                remaining: self.limit - accepted.len(),
            };
        }

        let retry_after = accepted
            .front()
            .map_or(self.window, |oldest| *oldest + self.window - now)
            .to_std()
            .unwrap_or_default();
        RateDecision::Limited { retry_after }
    }

    /// Shorthand for [`RateLimiter::check`] returning only the verdict.
    pub fn allow(&self, now: DateTime<Utc>) -> bool {
        self.check(now).is_allowed()
    }

    /// Accepted requests inside the window ending at `now`, without purging.
    #[must_use]
    pub fn in_window(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        self.accepted
            .lock()
            .iter()
            .filter(|stamp| **stamp >= cutoff)
            .count()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_minute(DEFAULT_MAX_REQUESTS_PER_MINUTE)
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
    fn burst_over_limit_rejects_exactly_one() {
        let limiter = RateLimiter::default();
        let rejected = (0..=DEFAULT_MAX_REQUESTS_PER_MINUTE)
            .map(|step| {
                let offset = i64::try_from(step).expect("small step") * 20;
                limiter.allow(start() + TimeDelta::milliseconds(offset))
            })
            .filter(|allowed| !allowed)
            .count();
        assert_eq!(rejected, 1, "N+1 requests within a second reject one");
    }

    #[test]
    fn window_slides_after_sixty_seconds() {
        let limiter = RateLimiter::per_minute(2);
        assert!(limiter.allow(start()), "first");
        assert!(limiter.allow(start() + TimeDelta::seconds(10)), "second");
        assert!(!limiter.allow(start() + TimeDelta::seconds(59)), "third in window");
        assert!(
            limiter.allow(start() + TimeDelta::milliseconds(60_001)),
            "first request has left the window"
        );
        assert_eq!(limiter.in_window(start() + TimeDelta::seconds(61)), 2);
    }

    #[test]
    fn rejection_reports_time_until_oldest_expires() {
        let limiter = RateLimiter::per_minute(1);
        assert!(limiter.allow(start()), "first");
        let decision = limiter.check(start() + TimeDelta::seconds(45));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::per_minute(1);
        assert!(limiter.allow(start()), "first");
        for second in 1..30 {
            assert!(!limiter.allow(start() + TimeDelta::seconds(second)), "flood");
        }
        assert!(
            limiter.allow(start() + TimeDelta::seconds(61)),
            "a flood does not extend the lockout"
        );
    }

    #[test]
    fn never_more_than_limit_in_any_trailing_window() {
        let limiter = RateLimiter::per_minute(5);
        let mut accepted = Vec::new();
        for step in 0..400_i64 {
            // irregular but ordered arrivals, 0.1 s to 1.9 s apart
            let jitter = (step * 37).rem_euclid(900);
            let instant = start() + TimeDelta::milliseconds(step * 1000 + jitter);
            if limiter.allow(instant) {
                accepted.push(instant);
            }
        }
        for (index, first) in accepted.iter().enumerate() {
            let inside = accepted
                .iter()
                .skip(index)
                .take_while(|later| **later - *first <= TimeDelta::seconds(60))
                .count();
            assert!(inside <= 5, "{inside} accepted within 60 s of {first}");
        }
    }
}
