//! Weekly report computation and read queries.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use pulse_core::report::{ReportCohort, ReportDetail, ReportStat, ReportSummary};
use pulse_core::week::{cohort_id, next_week, start_of_week};

use crate::backend::{fmt_ts, ts_from_millis, DuckDbBackend};

/// One row of the current-week activity snapshot: the latest ping per user,
/// in ascending ping-id order.
#[derive(Debug)]
struct ActivePing {
    user_id: String,
    beaker_version: Option<String>,
    os: Option<String>,
}

impl DuckDbBackend {
    /// Compute (or recompute) the report for the week containing
    /// `target_date` and return its id.
    ///
    /// The delete-and-repopulate sequence runs in a single transaction:
    /// readers never observe a half-built report, a failed computation
    /// leaves the previous report for that week intact, and the ping reads
    /// inside the transaction are one consistent snapshot. Re-running with
    /// no new pings reproduces identical counts, stats, and cohorts; only
    /// `compute_date` moves.
    pub async fn compute_report(&self, target_date: DateTime<Utc>) -> Result<String> {
        let this_week = start_of_week(target_date);
        let report_id = cohort_id(this_week);
        info!(report_id = %report_id, "Computing report");

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        // Idempotent reset: the report is a pure function of the ping log.
        tx.execute(
            "DELETE FROM reports WHERE id = ?1",
            duckdb::params![report_id],
        )?;
        tx.execute(
            "DELETE FROM report_stats WHERE report_id = ?1",
            duckdb::params![report_id],
        )?;
        tx.execute(
            "DELETE FROM report_cohorts WHERE report_id = ?1",
            duckdb::params![report_id],
        )?;

        // The very first ping anchors the cohort walk.
        let first_ping_at: Option<DateTime<Utc>> = match tx
            .prepare("SELECT epoch_ms(date) FROM pings ORDER BY date LIMIT 1")?
            .query_row([], |row| row.get::<_, i64>(0))
        {
            Ok(millis) => Some(ts_from_millis(millis)),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        // Current-week snapshot: latest ping per distinct user, ordered by
        // ping id so the stat buckets come out in first-appearance order.
        let active: Vec<ActivePing> = {
            let mut stmt = tx.prepare(
                r#"
WITH latest AS (
    SELECT user_id, beaker_version, os, id,
           ROW_NUMBER() OVER (PARTITION BY user_id ORDER BY id DESC) AS rn
    FROM pings
    WHERE date >= CAST(?1 AS TIMESTAMP)
)
SELECT user_id, beaker_version, os
FROM latest
WHERE rn = 1
ORDER BY id
"#,
            )?;
            let rows = stmt.query_map(duckdb::params![fmt_ts(this_week)], |row| {
                Ok(ActivePing {
                    user_id: row.get(0)?,
                    beaker_version: row.get(1)?,
                    os: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let active_user_count = active.len() as i64;
        let active_ids: HashSet<&str> = active.iter().map(|p| p.user_id.as_str()).collect();

        // Walk historical weeks from the first-ping week up to (exclusive
        // of) the report's week. A cohort is the set of users whose
        // first-ever ping fell in that week.
        let mut cohorts: Vec<ReportCohort> = Vec::new();
        if let Some(first_at) = first_ping_at {
            let mut week = start_of_week(first_at);
            while week < this_week {
                let week_end = next_week(week);
                let members: Vec<String> = {
                    let mut stmt = tx.prepare(
                        r#"SELECT DISTINCT user_id FROM pings
                           WHERE date >= CAST(?1 AS TIMESTAMP)
                             AND date < CAST(?2 AS TIMESTAMP)
                             AND is_first_ping"#,
                    )?;
                    let rows = stmt.query_map(
                        duckdb::params![fmt_ts(week), fmt_ts(week_end)],
                        |row| row.get::<_, String>(0),
                    )?;
                    rows.collect::<Result<Vec<_>, _>>()?
                };
                let still_active_count = members
                    .iter()
                    .filter(|user| active_ids.contains(user.as_str()))
                    .count() as i64;
                cohorts.push(ReportCohort {
                    start_week: cohort_id(week),
                    total_count: members.len() as i64,
                    still_active_count,
                });
                week = week_end;
            }
        }

        let total_user_count: i64 = tx
            .prepare("SELECT COUNT(DISTINCT user_id) FROM pings")?
            .query_row([], |row| row.get(0))?;

        // Version/OS buckets over the snapshot, first appearance first.
        let mut stats: Vec<ReportStat> = Vec::new();
        for ping in &active {
            match stats.iter_mut().find(|s| {
                s.beaker_version == ping.beaker_version && s.os == ping.os
            }) {
                Some(stat) => stat.count += 1,
                None => stats.push(ReportStat {
                    beaker_version: ping.beaker_version.clone(),
                    os: ping.os.clone(),
                    count: 1,
                }),
            }
        }

        tx.execute(
            r#"INSERT INTO reports (id, compute_date, active_user_count, total_user_count)
               VALUES (?1, CAST(?2 AS TIMESTAMP), ?3, ?4)"#,
            duckdb::params![report_id, fmt_ts(Utc::now()), active_user_count, total_user_count],
        )?;
        for (ord, stat) in stats.iter().enumerate() {
            tx.execute(
                r#"INSERT INTO report_stats (report_id, ord, beaker_version, os, count)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                duckdb::params![report_id, ord as i64, stat.beaker_version, stat.os, stat.count],
            )?;
        }
        for cohort in &cohorts {
            tx.execute(
                r#"INSERT INTO report_cohorts (report_id, start_week, total_count, still_active_count)
                   VALUES (?1, ?2, ?3, ?4)"#,
                duckdb::params![
                    report_id,
                    cohort.start_week,
                    cohort.total_count,
                    cohort.still_active_count,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            report_id = %report_id,
            active_users = active_user_count,
            total_users = total_user_count,
            cohorts = cohorts.len(),
            "Report stored"
        );
        Ok(report_id)
    }

    /// All stored reports, ordered by report id.
    pub async fn list_reports(&self) -> Result<Vec<ReportSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, epoch_ms(compute_date) FROM reports ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ReportSummary {
                id: row.get(0)?,
                compute_date: ts_from_millis(row.get(1)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// One report with its stats (insertion order) and cohorts
    /// (chronological). `None` for unknown ids.
    pub async fn get_report(&self, id: &str) -> Result<Option<ReportDetail>> {
        let conn = self.conn.lock().await;

        let header = conn
            .prepare(
                r#"SELECT id, epoch_ms(compute_date), active_user_count, total_user_count
                   FROM reports WHERE id = ?1"#,
            )?
            .query_row(duckdb::params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            });
        let (id, compute_ms, active_user_count, total_user_count) = match header {
            Ok(row) => row,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stats: Vec<ReportStat> = {
            let mut stmt = conn.prepare(
                r#"SELECT beaker_version, os, count FROM report_stats
                   WHERE report_id = ?1 ORDER BY ord"#,
            )?;
            let rows = stmt.query_map(duckdb::params![id], |row| {
                Ok(ReportStat {
                    beaker_version: row.get(0)?,
                    os: row.get(1)?,
                    count: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let cohorts: Vec<ReportCohort> = {
            let mut stmt = conn.prepare(
                r#"SELECT start_week, total_count, still_active_count FROM report_cohorts
                   WHERE report_id = ?1 ORDER BY start_week"#,
            )?;
            let rows = stmt.query_map(duckdb::params![id], |row| {
                Ok(ReportCohort {
                    start_week: row.get(0)?,
                    total_count: row.get(1)?,
                    still_active_count: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(Some(ReportDetail {
            id,
            compute_date: ts_from_millis(compute_ms),
            active_user_count,
            total_user_count,
            stats,
            cohorts,
        }))
    }
}
