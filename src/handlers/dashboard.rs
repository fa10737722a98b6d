use axum::{extract::State, response::Json, routing::get, Router};

use crate::error::AppError;
use crate::middleware::AdminSession;
use crate::services::DashboardStats;
use crate::AppState;

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/admin/dashboard/stats", get(dashboard_stats))
}

#[utoipa::path(
    get,
    path = "/admin/dashboard/stats",
    responses(
        (status = 200, description = "Aggregate counts and recent activity", body = DashboardStats),
        (status = 500, description = "Storage failure")
    ),
    tag = "Dashboard"
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.dashboard.stats().await?))
}
