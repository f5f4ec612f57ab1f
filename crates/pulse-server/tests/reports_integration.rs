use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pulse_core::config::{AppMode, Config};
use pulse_duckdb::DuckDbBackend;
use pulse_server::app::build_app;
use pulse_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/pulse-test".to_string(),
        mode: AppMode::Debug,
        report_schedule: "30 23 * * 6".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        rate_limit_disable: false,
    }
}

fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", "1.2.3.4")
        .body(Body::empty())
        .expect("build request")
}

/// Helper: extract JSON body from response.
async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid date")
}

/// Replay the reference fixture through `POST /ping` using the debug-mode
/// date override: five users first seen in the week of 2024-02-12, two in
/// the week of 2024-03-11, four of the seven active in the week of
/// 2024-03-18.
async fn replay_fixture(app: &axum::Router) {
    let mut pings: Vec<(&str, &str, DateTime<Utc>)> = Vec::new();
    for user in ["a1", "a2", "a3", "a4", "a5"] {
        pings.push((user, "0.7.9", utc(2024, 2, 13, 12, 0)));
    }
    for user in ["b1", "b2"] {
        pings.push((user, "0.7.10", utc(2024, 3, 12, 12, 0)));
    }
    pings.push(("a1", "0.8.0", utc(2024, 3, 18, 9, 0)));
    pings.push(("a2", "0.8.0", utc(2024, 3, 18, 9, 5)));
    pings.push(("a3", "0.8.0", utc(2024, 3, 18, 9, 10)));
    pings.push(("b1", "0.7.10", utc(2024, 3, 18, 10, 0)));

    for (user, version, at) in pings {
        let request = Request::builder()
            .method("POST")
            .uri(format!(
                "/ping?userId={user}&ip=123.123.123.123&beakerVersion={version}&os=win10&date={}",
                at.timestamp_millis()
            ))
            .header("x-forwarded-for", "1.2.3.4")
            .body(Body::empty())
            .expect("build request");
        let response = app.clone().oneshot(request).await.expect("request");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

/// The fixture report as JSON, with `computeDate` type-erased (it is wall
/// clock and differs between computations).
async fn fetch_fixture_report(app: &axum::Router) -> Value {
    let response = app
        .clone()
        .oneshot(get("/reports/2024week12"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = json_body(response).await;
    assert!(
        body["computeDate"].is_i64(),
        "computeDate must be Unix millis"
    );
    body["computeDate"] = json!("checked");
    body
}

// ============================================================
// Empty store
// ============================================================
#[tokio::test]
async fn test_list_reports_empty() {
    let (_state, app) = setup();

    let response = app.oneshot(get("/reports")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_unknown_report_is_404() {
    let (_state, app) = setup();

    let response = app
        .oneshot(get("/reports/1999week01"))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

// ============================================================
// End-to-end: ingest fixture over HTTP, compute, read back
// ============================================================
#[tokio::test]
async fn test_fixture_report_over_http() {
    let (state, app) = setup();
    replay_fixture(&app).await;

    state
        .db
        .compute_report(utc(2024, 3, 19, 0, 0))
        .await
        .expect("compute report");

    // Listing shows exactly one report.
    let response = app.clone().oneshot(get("/reports")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let listing = json_body(response).await;
    let reports = listing.as_array().expect("array");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["id"], "2024week12");
    assert!(reports[0]["computeDate"].is_i64());

    let body = fetch_fixture_report(&app).await;
    assert_eq!(
        body,
        json!({
            "id": "2024week12",
            "computeDate": "checked",
            "activeUserCount": 4,
            "totalUserCount": 7,
            "stats": [
                { "beaker": "0.8.0", "os": "win10", "count": 3 },
                { "beaker": "0.7.10", "os": "win10", "count": 1 }
            ],
            "cohorts": [
                { "startWeek": "2024week07", "totalCount": 5, "stillActiveCount": 3 },
                { "startWeek": "2024week08", "totalCount": 0, "stillActiveCount": 0 },
                { "startWeek": "2024week09", "totalCount": 0, "stillActiveCount": 0 },
                { "startWeek": "2024week10", "totalCount": 0, "stillActiveCount": 0 },
                { "startWeek": "2024week11", "totalCount": 2, "stillActiveCount": 1 }
            ]
        })
    );
}

#[tokio::test]
async fn test_recomputing_does_not_change_the_results() {
    let (state, app) = setup();
    replay_fixture(&app).await;

    state
        .db
        .compute_report(utc(2024, 3, 19, 0, 0))
        .await
        .expect("compute report");
    let first = fetch_fixture_report(&app).await;

    state
        .db
        .compute_report(utc(2024, 3, 19, 0, 0))
        .await
        .expect("recompute report");
    let second = fetch_fixture_report(&app).await;

    assert_eq!(second, first);
}

// ============================================================
// Health
// ============================================================
#[tokio::test]
async fn test_health_reports_ok() {
    let (_state, app) = setup();

    let response = app.oneshot(get("/health")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}
