//! Aggregated dashboard statistics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use clinic_common::protocol::StatsSnapshot;

use crate::auth::middleware::AuthAdmin;
use crate::error::ApiError;
use crate::stats;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(dashboard_stats))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Summary counters with month-over-month trends"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
pub async fn dashboard_stats(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Result<Json<StatsSnapshot>, ApiError> {
    let snapshot = stats::gather(&state.db, Utc::now()).await?;
    Ok(Json(snapshot))
}
