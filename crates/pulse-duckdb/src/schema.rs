/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is passed at runtime from `Config.duckdb_memory_limit`
/// (env `PULSE_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default (80% of system RAM) is not acceptable for a
/// server process. `SET threads = 2` keeps the background pool small; the
/// connection is single-writer anyway.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- PINGS (append-only heartbeat log)
-- ===========================================
-- One row per (user_id, UTC calendar day); a newer ping on the same day
-- replaces the older one at ingestion time. is_first_ping is decided at
-- insertion and never recomputed.
CREATE TABLE IF NOT EXISTS pings (
    id              BIGINT PRIMARY KEY,            -- monotonic, natural sort key
    user_id         VARCHAR NOT NULL,              -- lowercase hex, validated at the boundary
    date            TIMESTAMP NOT NULL,            -- receipt time, UTC
    is_first_ping   BOOLEAN NOT NULL,
    beaker_version  VARCHAR,
    os              VARCHAR,
    ip              VARCHAR
);

-- Per-user dedup delete and first-ping probe
CREATE INDEX IF NOT EXISTS idx_pings_user_date
    ON pings(user_id, date);

-- Weekly activity snapshot and earliest-ping lookup
CREATE INDEX IF NOT EXISTS idx_pings_date
    ON pings(date);

-- Cohort totals scan only first-ping rows in a week range
CREATE INDEX IF NOT EXISTS idx_pings_first_date
    ON pings(is_first_ping, date);

-- ===========================================
-- REPORTS (owned by the compute engine)
-- ===========================================
-- Report, stat, and cohort rows for a report id are deleted and fully
-- regenerated inside one transaction on every computation.
CREATE TABLE IF NOT EXISTS reports (
    id                VARCHAR PRIMARY KEY,         -- '<iso-year>week<NN>'
    compute_date      TIMESTAMP NOT NULL,
    active_user_count BIGINT NOT NULL,
    total_user_count  BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS report_stats (
    report_id       VARCHAR NOT NULL,
    ord             INTEGER NOT NULL,              -- bucket insertion order, 0-based
    beaker_version  VARCHAR,
    os              VARCHAR,
    count           BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_report_stats_report
    ON report_stats(report_id, ord);

CREATE TABLE IF NOT EXISTS report_cohorts (
    report_id          VARCHAR NOT NULL,
    start_week         VARCHAR NOT NULL,
    total_count        BIGINT NOT NULL,
    still_active_count BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_report_cohorts_report
    ON report_cohorts(report_id, start_week);
"#
    )
}
