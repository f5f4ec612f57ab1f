use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};

use pulse_core::ping::{is_valid_user_id, PingParams};

use crate::{error::AppError, routes::extract_client_ip, state::AppState};

/// `POST /ping` — ingest one heartbeat.
///
/// ## Wire contract
/// All parameters travel in the query string (`userId`, `ip`,
/// `beakerVersion`, `os`, optional `date` in Unix milliseconds). The
/// response is `204 No Content` whether or not anything was written:
/// clients fire pings blindly and must never be shown an error for a
/// malformed id.
///
/// ## Validation
/// `userId` must be non-empty lowercase hex; anything else is skipped
/// without a write. The `date` override is honored only in debug mode so
/// tests can install historical fixtures; production always stamps
/// receipt time.
///
/// ## Rate limiting
/// One accepted ping per IP per 24 h (silent drop) on top of the general
/// per-IP window; both disabled in debug mode. Storage failures do
/// propagate as 500, only *invalid input* is swallowed.
#[tracing::instrument(skip(state, headers, params))]
pub async fn ping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<PingParams>,
) -> Result<StatusCode, AppError> {
    let client_ip = extract_client_ip(&headers);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }
    if !state.allow_ping(&client_ip).await {
        return Ok(StatusCode::NO_CONTENT);
    }

    let Some(user_id) = params.user_id.as_deref().filter(|u| is_valid_user_id(u)) else {
        // Invalid or missing id: deliberately a no-op, not an error.
        return Ok(StatusCode::NO_CONTENT);
    };

    let date = resolve_date(state.config.current().is_debug(), params.date);
    state
        .db
        .insert_ping(
            user_id,
            params.ip.as_deref(),
            params.beaker_version.as_deref(),
            params.os.as_deref(),
            date,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Receipt time for a ping: the debug-mode override when present and
/// parseable, wall clock otherwise.
fn resolve_date(is_debug: bool, override_millis: Option<i64>) -> DateTime<Utc> {
    if is_debug {
        if let Some(at) = override_millis.and_then(DateTime::from_timestamp_millis) {
            return at;
        }
    }
    Utc::now()
}
