//! Scheduler tick, opt-in resend, and liveness routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::pipeline::{TickSummary, run_tick};

/// The scheduler entry point, invoked by external cron every 15 minutes.
/// Takes no input; returns the batch summary for observability.
pub async fn digest_tick(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TickSummary>, ApiError> {
    let summary = run_tick(&state, Utc::now()).await?;
    Ok(Json(summary))
}

/// Re-sends the opt-in request to one subscriber, honoring the
/// calendar-day cool-down.
pub async fn resend_opt_in(
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .tracker
        .resend_opt_in(subscription_id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}
