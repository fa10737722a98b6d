use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Pagination;
use crate::domain::{PayoutRequest, PayoutStatus, TransactionStatus};
use crate::error::AppError;
use crate::middleware::AdminSession;
use crate::AppState;

pub fn payout_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/payouts/list", get(list_payouts))
        .route("/admin/payouts/:id/send", post(send_payout))
        .route("/admin/payouts/:id/refresh", post(refresh_payout))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendPayoutResponse {
    pub success: bool,
    pub tracking_number: String,
    pub transaction_status: TransactionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshPayoutResponse {
    pub success: bool,
    pub status: PayoutStatus,
    pub changed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutListResponse {
    pub payouts: Vec<PayoutRequest>,
}

#[utoipa::path(
    post,
    path = "/admin/payouts/{id}/send",
    params(("id" = Uuid, Path, description = "Payout request id")),
    responses(
        (status = 200, description = "Payout accepted by the provider", body = SendPayoutResponse),
        (status = 400, description = "Payout already processed or recipient incomplete"),
        (status = 404, description = "Payout request not found"),
        (status = 502, description = "Payout provider failed")
    ),
    tag = "Payouts"
)]
pub async fn send_payout(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<SendPayoutResponse>, AppError> {
    tracing::info!(admin_id = %admin.user_id, payout_id = %id, "Admin payout send");
    let dispatched = state.machine.send_payout(id).await?;
    Ok(Json(SendPayoutResponse {
        success: true,
        tracking_number: dispatched.tracking_number,
        transaction_status: dispatched.new_status,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/payouts/{id}/refresh",
    params(("id" = Uuid, Path, description = "Payout request id")),
    responses(
        (status = 200, description = "Provider status applied", body = RefreshPayoutResponse),
        (status = 400, description = "Payout is not in flight"),
        (status = 404, description = "Payout request not found"),
        (status = 502, description = "Payout provider failed")
    ),
    tag = "Payouts"
)]
pub async fn refresh_payout(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<RefreshPayoutResponse>, AppError> {
    let refreshed = state.machine.refresh_payout(id).await?;
    Ok(Json(RefreshPayoutResponse {
        success: true,
        status: refreshed.status,
        changed: refreshed.changed,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/payouts/list",
    params(Pagination),
    responses((status = 200, description = "Payout requests, newest first", body = PayoutListResponse)),
    tag = "Payouts"
)]
pub async fn list_payouts(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PayoutListResponse>, AppError> {
    let (limit, offset) = pagination.resolve();
    let payouts = state.repos.payouts.list(limit, offset).await?;
    Ok(Json(PayoutListResponse { payouts }))
}
