//! Recurring-task scheduling.
//!
//! A [`Schedule`] is the classic 5-field cron line (`minute hour
//! day-of-month month day-of-week`), each field either `*` or a number.
//! [`run_recurring`] is a generic runner: it sleeps until the next
//! occurrence in local time and invokes the registered handler. The
//! handler itself (report computation, in `main`) knows nothing about
//! scheduling.

use std::future::Future;

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike};
use tracing::{error, info};

/// Scan limit for [`Schedule::next_after`]: five years of minutes. Any
/// satisfiable field combination matches well within this (a fixed
/// day-of-month + month recurs at least yearly, modulo Feb 29).
const MAX_SCAN_MINUTES: i64 = 5 * 366 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Exact(u32),
}

impl Field {
    fn matches(self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Exact(expected) => expected == value,
        }
    }
}

/// A parsed cron expression such as `"30 23 * * 6"` (Saturday 23:30).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    /// 0 = Sunday .. 6 = Saturday; `7` in the expression normalizes to 0.
    day_of_week: Field,
}

impl Schedule {
    /// Parse a 5-field cron expression. Fields are `*` or a single number;
    /// ranges, lists, and steps are not part of this subset.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "schedule must have 5 fields (minute hour dom month dow), got {}: {expr:?}",
                fields.len()
            ));
        }
        Ok(Self {
            minute: parse_field(fields[0], 0, 59, "minute")?,
            hour: parse_field(fields[1], 0, 23, "hour")?,
            day_of_month: parse_field(fields[2], 1, 31, "day-of-month")?,
            month: parse_field(fields[3], 1, 12, "month")?,
            day_of_week: match parse_field(fields[4], 0, 7, "day-of-week")? {
                Field::Exact(7) => Field::Exact(0),
                field => field,
            },
        })
    }

    fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self
                .day_of_week
                .matches(at.weekday().num_days_from_sunday())
    }

    /// The first occurrence strictly after `after`, or `None` for an
    /// unsatisfiable combination (e.g. day 31 of month 2).
    ///
    /// Plain minute scan: the schedule fires at most weekly in practice, so
    /// the scan is a few thousand cheap component checks once per sleep.
    pub fn next_after<Tz: TimeZone>(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut candidate = (after + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        for _ in 0..MAX_SCAN_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

fn parse_field(raw: &str, min: u32, max: u32, name: &str) -> Result<Field, String> {
    if raw == "*" {
        return Ok(Field::Any);
    }
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("invalid {name} field: {raw:?}"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("{name} field out of range {min}..={max}: {value}"));
    }
    Ok(Field::Exact(value))
}

/// Run `task` forever on `schedule`, in local time.
///
/// A failed run is logged and the loop continues; the next occurrence is
/// recomputed after every run so drift does not accumulate.
pub async fn run_recurring<F, Fut>(name: &'static str, schedule: Schedule, task: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    loop {
        let now = Local::now();
        let Some(next) = schedule.next_after(now) else {
            error!(task = name, "Schedule has no future occurrence; scheduler stopped");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(task = name, next = %next, "Next scheduled run");
        tokio::time::sleep(wait).await;
        if let Err(e) = task().await {
            error!(task = name, error = %e, "Scheduled task failed");
        }
    }
}
