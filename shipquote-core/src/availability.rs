//! Whether a service may be offered at a given instant.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::model::ServiceDefinition;

/// True when `service` is enabled and `now`, read in the store's civil
/// timezone `tz`, falls on an allowed weekday inside the `[start, end)` window.
#[must_use]
pub fn is_available(service: &ServiceDefinition, now: DateTime<Utc>, tz: Tz) -> bool {
    if !service.enabled {
        return false;
    }

    let local = now.with_timezone(&tz);
    if !service.weekdays.contains(&local.weekday()) {
        return false;
    }

    let minute = u16::try_from(local.hour() * 60 + local.minute()).unwrap_or(u16::MAX);
    service.window.contains(minute)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Weekday};
    use chrono_tz::America::Santiago;

    use super::*;
    use crate::model::{ClockTime, PriceRange, PriceTable, TimeWindow};

    fn scheduled() -> ServiceDefinition {
        ServiceDefinition {
            name: "Programado".to_owned(),
            description: String::new(),
            delivery_time: "Día hábil siguiente".to_owned(),
            enabled: true,
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            window: TimeWindow::new(
                ClockTime::from_hm(8, 0).expect("08:00"),
                ClockTime::from_hm(20, 0).expect("20:00"),
            ),
            price_table: PriceTable::try_from(vec![PriceRange::new(0.0, None, 4000, "Todo")])
                .expect("non-empty table"),
            area_overrides: Vec::new(),
        }
    }

    /// Santiago civil time to UTC.
    fn civil(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Santiago
            .with_ymd_and_hms(2024, 6, day, hour, minute, 0)
            .single()
            .expect("unambiguous civil time")
            .with_timezone(&Utc)
    }

    #[test]
    fn weekday_inside_window_is_available() {
        // 2024-06-03 is a Monday
        assert!(is_available(&scheduled(), civil(3, 8, 0), Santiago), "start is included");
        assert!(is_available(&scheduled(), civil(3, 19, 59), Santiago), "last minute");
    }

    #[test]
    fn end_of_window_is_excluded() {
        assert!(!is_available(&scheduled(), civil(3, 20, 0), Santiago), "end is excluded");
        assert!(!is_available(&scheduled(), civil(3, 7, 59), Santiago), "before start");
    }

    #[test]
    fn saturday_is_excluded_even_inside_hours() {
        // 2024-06-08 is a Saturday
        assert!(!is_available(&scheduled(), civil(8, 10, 0), Santiago));
    }

    #[test]
    fn disabled_service_is_never_available() {
        let mut service = scheduled();
        service.enabled = false;
        for hour in 0..24 {
            assert!(
                !is_available(&service, civil(4, hour, 30), Santiago),
                "disabled at {hour}:30"
            );
        }
    }

    #[test]
    fn civil_time_not_utc_decides() {
        // 19:00 Friday in Santiago is 23:00 UTC; 21:00 Friday is already Saturday in UTC
        let friday_evening = civil(7, 19, 0);
        assert_eq!(friday_evening.weekday(), Weekday::Fri, "UTC 23:00 still Friday");
        assert!(is_available(&scheduled(), friday_evening, Santiago));

        let utc_saturday_morning = Utc
            .with_ymd_and_hms(2024, 6, 8, 1, 0, 0)
            .single()
            .expect("valid instant");
        assert!(
            !is_available(&scheduled(), utc_saturday_morning, Santiago),
            "21:00 Friday in Santiago is outside the window"
        );
    }
}
