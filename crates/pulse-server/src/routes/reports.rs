use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use pulse_core::report::{ReportDetail, ReportSummary};

use crate::{error::AppError, routes::extract_client_ip, state::AppState};

/// `GET /reports` — every stored report, ordered by id.
#[tracing::instrument(skip(state, headers))]
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReportSummary>>, AppError> {
    let client_ip = extract_client_ip(&headers);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }
    Ok(Json(state.db.list_reports().await?))
}

/// `GET /reports/{id}` — one report with stats and cohorts.
///
/// Unknown ids are a typed NotFound (404 + `not_found` envelope), not an
/// internal error.
#[tracing::instrument(skip(state, headers))]
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReportDetail>, AppError> {
    let client_ip = extract_client_ip(&headers);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }
    state
        .db
        .get_report(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("unknown report id: {id}")))
}
