//! Ping ingestion: per-day dedup plus first-ping detection.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use pulse_core::id::next_ping_id;
use pulse_core::ping::Ping;
use pulse_core::week::start_of_day;

use crate::backend::{fmt_ts, DuckDbBackend};

impl DuckDbBackend {
    /// Record one heartbeat for `user_id` at `date`.
    ///
    /// The caller has already validated `user_id` and resolved `date`
    /// (receipt time, or the debug-mode override). The whole sequence runs
    /// in one transaction behind the connection mutex, so two concurrent
    /// pings for the same user cannot both observe "no existing row".
    ///
    /// Step order matters: the delete only removes rows from `date`'s
    /// calendar day onward, so the first-ping probe that follows still sees
    /// the user's full history. Probing before the delete (or deleting
    /// across all days) could misclassify a user whose only prior row was
    /// earlier the same day.
    pub async fn insert_ping(
        &self,
        user_id: &str,
        ip: Option<&str>,
        beaker_version: Option<&str>,
        os: Option<&str>,
        date: DateTime<Utc>,
    ) -> Result<()> {
        let today = fmt_ts(start_of_day(date));

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        // Collapse same-day duplicates; the newest call for a day wins.
        tx.execute(
            "DELETE FROM pings WHERE user_id = ?1 AND date >= CAST(?2 AS TIMESTAMP)",
            duckdb::params![user_id, today],
        )?;

        // Any row left (any day) means this user has pinged before.
        let existing: i64 = tx
            .prepare("SELECT COUNT(*) FROM pings WHERE user_id = ?1")?
            .query_row(duckdb::params![user_id], |row| row.get(0))?;

        let ping = Ping {
            id: next_ping_id(),
            user_id: user_id.to_string(),
            date,
            is_first_ping: existing == 0,
            beaker_version: beaker_version.map(str::to_string),
            os: os.map(str::to_string),
            ip: ip.map(str::to_string),
        };

        tx.execute(
            r#"INSERT INTO pings (id, user_id, date, is_first_ping, beaker_version, os, ip)
               VALUES (?1, ?2, CAST(?3 AS TIMESTAMP), ?4, ?5, ?6, ?7)"#,
            duckdb::params![
                ping.id,
                ping.user_id,
                fmt_ts(ping.date),
                ping.is_first_ping,
                ping.beaker_version,
                ping.os,
                ping.ip,
            ],
        )?;

        tx.commit()?;
        debug!(user_id, first = ping.is_first_ping, "Ping recorded");
        Ok(())
    }

    /// Number of stored ping rows for one user, across all days.
    pub async fn count_pings_by(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .prepare("SELECT COUNT(id) FROM pings WHERE user_id = ?1")?
            .query_row(duckdb::params![user_id], |row| row.get(0))?;
        Ok(count)
    }
}
