use chrono::{DateTime, Duration, TimeZone, Utc};

use pulse_duckdb::DuckDbBackend;

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid date")
}

async fn ping_at(db: &DuckDbBackend, user_id: &str, version: &str, at: DateTime<Utc>) {
    db.insert_ping(user_id, Some("1.2.3.4"), Some(version), Some("win10"), at)
        .await
        .expect("insert ping");
}

/// (date_millis, is_first_ping, beaker_version) per row for one user,
/// ordered by ping id.
async fn rows_for(db: &DuckDbBackend, user_id: &str) -> Vec<(i64, bool, Option<String>)> {
    let conn = db.conn_for_test().await;
    let mut stmt = conn
        .prepare(
            "SELECT epoch_ms(date), is_first_ping, beaker_version \
             FROM pings WHERE user_id = ?1 ORDER BY id",
        )
        .expect("prepare");
    stmt.query_map(pulse_duckdb::duckdb::params![user_id], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })
    .expect("query")
    .collect::<Result<Vec<_>, _>>()
    .expect("collect")
}

#[tokio::test]
async fn same_day_pings_collapse_to_the_newest() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let day = utc(2024, 3, 18, 8, 0);

    ping_at(&db, "abc123", "0.7.9", day).await;
    ping_at(&db, "abc123", "0.7.10", day + Duration::hours(1)).await;
    ping_at(&db, "abc123", "0.8.0", day + Duration::hours(2)).await;

    assert_eq!(db.count_pings_by("abc123").await.expect("count"), 1);

    let rows = rows_for(&db, "abc123").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].2.as_deref(), Some("0.8.0"), "newest call wins");
}

#[tokio::test]
async fn same_day_replacement_keeps_the_first_ping_flag() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let day = utc(2024, 3, 18, 8, 0);

    ping_at(&db, "abc123", "0.8.0", day).await;
    ping_at(&db, "abc123", "0.8.0", day + Duration::hours(3)).await;

    // The replacement is still this user's first-ever row.
    let rows = rows_for(&db, "abc123").await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].1, "replacement on the first day stays first");
}

#[tokio::test]
async fn exactly_one_first_ping_row_and_it_is_the_earliest() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");

    ping_at(&db, "abc123", "0.7.9", utc(2024, 3, 12, 9, 0)).await;
    ping_at(&db, "abc123", "0.7.10", utc(2024, 3, 13, 9, 0)).await;
    ping_at(&db, "abc123", "0.8.0", utc(2024, 3, 18, 9, 0)).await;

    let rows = rows_for(&db, "abc123").await;
    assert_eq!(rows.len(), 3, "one row per day");

    let first_flags: Vec<bool> = rows.iter().map(|r| r.1).collect();
    assert_eq!(first_flags, vec![true, false, false]);

    let earliest = rows.iter().map(|r| r.0).min().expect("rows");
    let flagged = rows.iter().find(|r| r.1).expect("first-ping row");
    assert_eq!(
        flagged.0, earliest,
        "the flagged row must be the chronologically earliest"
    );
}

#[tokio::test]
async fn users_do_not_interfere_with_each_other() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let day = utc(2024, 3, 18, 8, 0);

    ping_at(&db, "aa", "0.8.0", day).await;
    ping_at(&db, "bb", "0.8.0", day + Duration::minutes(1)).await;

    let a_rows = rows_for(&db, "aa").await;
    let b_rows = rows_for(&db, "bb").await;
    assert!(a_rows[0].1, "each user's first ping is flagged");
    assert!(b_rows[0].1, "each user's first ping is flagged");

    assert_eq!(db.count_pings_by("aa").await.expect("count"), 1);
    assert_eq!(db.count_pings_by("bb").await.expect("count"), 1);
    assert_eq!(db.count_pings_by("cc").await.expect("count"), 0);
}

#[tokio::test]
async fn nullable_fields_are_stored_as_null() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    db.insert_ping("abc123", None, None, None, utc(2024, 3, 18, 8, 0))
        .await
        .expect("insert ping");

    let rows = rows_for(&db, "abc123").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].2, None);
}
