use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::{Priority, ResponsePattern};

const STEP_MINUTES: i64 = 5;
const MAX_LOOKAHEAD_DAYS: i64 = 14;

/// `true` when `minute_of_day` (0..1440) falls inside `[start, end)`,
/// handling windows that wrap past midnight (e.g. 22:00-08:00).
pub fn is_within_quiet_hours(minute_of_day: i32, start: i32, end: i32) -> bool {
    if start <= end {
        minute_of_day >= start && minute_of_day < end
    } else {
        minute_of_day >= start || minute_of_day < end
    }
}

/// The next instant at or after `earliest`, local to `tz`, at `hour:minute`
/// that also clears quiet hours.
fn next_local_time(
    earliest: DateTime<Utc>,
    tz: Tz,
    hour: u32,
    minute: u32,
    quiet_start: i32,
    quiet_end: i32,
) -> DateTime<Utc> {
    let mut candidate_date = earliest.with_timezone(&tz).date_naive();
    loop {
        if let Some(naive) = candidate_date.and_hms_opt(hour, minute, 0) {
            if let Some(candidate_local) = tz.from_local_datetime(&naive).single() {
                let candidate_utc = candidate_local.with_timezone(&Utc);
                let minute_of_day = hour as i32 * 60 + minute as i32;
                if candidate_utc >= earliest && !is_within_quiet_hours(minute_of_day, quiet_start, quiet_end) {
                    return candidate_utc;
                }
            }
        }
        candidate_date = candidate_date.succ_opt().expect("date overflow");
    }
}

/// The next instant at or after `now`, local to `tz`, landing on
/// `quiet_end_minute` (minutes since local midnight).
pub fn next_quiet_hours_end(now: DateTime<Utc>, tz: Tz, quiet_end_minute: i32) -> DateTime<Utc> {
    let hour = (quiet_end_minute / 60) as u32;
    let minute = (quiet_end_minute % 60) as u32;
    let mut date = now.with_timezone(&tz).date_naive();
    loop {
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            if let Some(candidate_local) = tz.from_local_datetime(&naive).single() {
                let candidate_utc = candidate_local.with_timezone(&Utc);
                if candidate_utc > now {
                    return candidate_utc;
                }
            }
        }
        date = date.succ_opt().expect("date overflow");
    }
}

/// The next calendar day (strictly after `now`'s local date) at `hour:minute`
/// local to `tz`. Used for the daily-budget-exhausted reschedule (spec.md
/// §4.1 gate 2: "next local day 08:00").
pub fn next_local_day_at(now: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut date = now.with_timezone(&tz).date_naive().succ_opt().expect("date overflow");
    loop {
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            if let Some(candidate_local) = tz.from_local_datetime(&naive).single() {
                return candidate_local.with_timezone(&Utc);
            }
        }
        date = date.succ_opt().expect("date overflow");
    }
}

/// Walks forward from `earliest` in 5-minute steps until the candidate falls
/// on a day in `best_weekdays` (if non-empty) and hour in `best_hours`,
/// clipped outside quiet hours, per spec.md §4.1 "Optimal Send Time".
/// `urgent` priority ignores the pattern entirely and returns `earliest`
/// unchanged.
pub fn compute_optimal_send_time(
    earliest: DateTime<Utc>,
    pattern: Option<&ResponsePattern>,
    priority: Priority,
    tz: Tz,
    quiet_start_minute: i32,
    quiet_end_minute: i32,
) -> DateTime<Utc> {
    if priority == Priority::Urgent {
        return earliest;
    }

    let no_pattern_fallback = || next_local_time(earliest, tz, 10, 0, quiet_start_minute, quiet_end_minute);

    let Some(pattern) = pattern else {
        return no_pattern_fallback();
    };
    if pattern.best_hours.is_empty() && pattern.best_weekdays.is_empty() {
        return no_pattern_fallback();
    }

    let limit = earliest + Duration::days(MAX_LOOKAHEAD_DAYS);
    let mut candidate = earliest;

    while candidate < limit {
        let local = candidate.with_timezone(&tz);
        let minute_of_day = local.hour() as i32 * 60 + local.minute() as i32;

        let weekday_ok =
            pattern.best_weekdays.is_empty() || pattern.best_weekdays.contains(&local.weekday().num_days_from_sunday());
        let hour_ok = pattern.best_hours.is_empty() || pattern.best_hours.contains(&local.hour());
        let quiet_ok = !is_within_quiet_hours(minute_of_day, quiet_start_minute, quiet_end_minute);

        if weekday_ok && hour_ok && quiet_ok {
            return candidate;
        }
        candidate += Duration::minutes(STEP_MINUTES);
    }

    // Pattern never satisfied within the lookahead window; still send rather
    // than defer indefinitely.
    no_pattern_fallback()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(hours: Vec<u32>, weekdays: Vec<u32>) -> ResponsePattern {
        ResponsePattern {
            best_hours: hours,
            best_weekdays: weekdays,
            avg_response_latency_seconds: None,
            engagement_score: None,
        }
    }

    #[test]
    fn urgent_ignores_pattern_and_uses_earliest() {
        let earliest = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        let got = compute_optimal_send_time(earliest, None, Priority::Urgent, chrono_tz::UTC, 1320, 480);
        assert_eq!(got, earliest);
    }

    #[test]
    fn no_pattern_defaults_to_next_ten_am() {
        let earliest = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        let got = compute_optimal_send_time(earliest, None, Priority::Medium, chrono_tz::UTC, 1320, 480);
        assert_eq!(got.hour(), 10);
        assert!(got >= earliest);
    }

    #[test]
    fn walks_forward_to_best_hour() {
        let earliest = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let p = pattern(vec![14], vec![]);
        let got = compute_optimal_send_time(earliest, Some(&p), Priority::Medium, chrono_tz::UTC, 1320, 480);
        assert_eq!(got.hour(), 14);
        assert_eq!(got.date_naive(), earliest.date_naive());
    }

    #[test]
    fn quiet_hours_detection_wraps_midnight() {
        assert!(is_within_quiet_hours(23 * 60, 1320, 480));
        assert!(is_within_quiet_hours(0, 1320, 480));
        assert!(!is_within_quiet_hours(9 * 60, 1320, 480));
    }

    #[test]
    fn next_local_day_at_is_strictly_the_next_day() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 0, 0).unwrap();
        let got = next_local_day_at(now, chrono_tz::UTC, 8, 0);
        assert_eq!(got.day(), 6);
        assert_eq!(got.hour(), 8);
    }
}
