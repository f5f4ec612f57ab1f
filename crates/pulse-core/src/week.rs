//! Calendar bucketing for pings and reports.
//!
//! All bucketing is done in UTC on ISO-8601 weeks: a week starts Monday
//! 00:00:00 UTC, and the report/cohort id for a week is derived from the
//! ISO year and ISO week number so the id is deterministic across years
//! (`"2024week07"`). Week 1 of an ISO year can start in the previous
//! calendar year, which is why the id uses the ISO year, not the calendar
//! year.

use chrono::{DateTime, Datelike, Duration, Utc};

/// Truncate a timestamp to the start of its UTC calendar day.
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        .and_utc()
}

/// Truncate a timestamp to the start of its ISO week (Monday 00:00 UTC).
pub fn start_of_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    monday.and_hms_opt(0, 0, 0).expect("valid time").and_utc()
}

/// Advance a week start to the start of the following week.
pub fn next_week(week_start: DateTime<Utc>) -> DateTime<Utc> {
    week_start + Duration::weeks(1)
}

/// Deterministic id for the week containing `at`: `"<iso-year>week<NN>"`.
///
/// The same id keys both reports (for the week they were computed for) and
/// cohorts (for the week the cohort's users first appeared in).
pub fn cohort_id(at: DateTime<Utc>) -> String {
    let iso = at.date_naive().iso_week();
    format!("{}week{:02}", iso.year(), iso.week())
}
