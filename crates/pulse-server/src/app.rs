use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// `TraceLayer` provides structured request/response logging via `tracing`.
/// Rate limiting is handled inside the handlers through [`AppState`] so it
/// can consult the current config snapshot per request.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/ping", post(routes::ping::ping))
        .route("/reports", get(routes::reports::list_reports))
        .route("/reports/{id}", get(routes::reports::get_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
