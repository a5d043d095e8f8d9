// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Length of the trailing window route metrics are computed over.
pub const AGGREGATION_WINDOW_HOURS: i64 = 24;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Exclusive lower bound of the aggregation window ending at `now`.
pub fn aggregation_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(AGGREGATION_WINDOW_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_start_is_one_day_back() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            format_utc_rfc3339(aggregation_window_start(now)),
            "2024-03-09T12:00:00Z"
        );
    }
}
