//! Report result types returned by the store's read queries.
//!
//! Wire names are camelCase and `computeDate` serializes as Unix
//! milliseconds, preserving the JSON contract of the original report
//! consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of `GET /reports`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub compute_date: DateTime<Utc>,
}

/// One version/OS bucket over the report week's active users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStat {
    #[serde(rename = "beaker")]
    pub beaker_version: Option<String>,
    pub os: Option<String>,
    pub count: i64,
}

/// One historical first-seen cohort and how much of it is still active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCohort {
    pub start_week: String,
    pub total_count: i64,
    pub still_active_count: i64,
}

/// The full persisted report for one week, as returned by `GET /reports/{id}`.
///
/// `stats` is in bucket-insertion order (first appearance over the week's
/// activity snapshot); `cohorts` is ordered by `start_week` ascending.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub compute_date: DateTime<Utc>,
    pub active_user_count: i64,
    pub total_user_count: i64,
    pub stats: Vec<ReportStat>,
    pub cohorts: Vec<ReportCohort>,
}
