use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Pagination;
use crate::domain::{AdminAction, LedgerEntry, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::middleware::AdminSession;
use crate::validation;
use crate::AppState;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/transactions/list", get(list_transactions))
        .route("/admin/transactions/:id/update", post(update_transaction))
        .route("/admin/transactions/:id/ledger", get(transaction_ledger))
        .route("/admin/transactions/:id/refresh-swap", post(refresh_swap))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTransactionRequest {
    /// `mark_received`, `execute_swap` or `send_payout`.
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionResponse {
    pub success: bool,
    pub new_status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSwapResponse {
    pub success: bool,
    pub new_status: TransactionStatus,
    pub changed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub transaction_id: Uuid,
    pub entries: Vec<LedgerEntry>,
}

#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/update",
    params(("id" = Uuid, Path, description = "Transaction id")),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Action applied", body = UpdateTransactionResponse),
        (status = 400, description = "Invalid action for the transaction's type or status"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Transaction not found"),
        (status = 502, description = "Provider call failed")
    ),
    tag = "Transactions"
)]
pub async fn update_transaction(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateTransactionRequest>, JsonRejection>,
) -> Result<Json<UpdateTransactionResponse>, AppError> {
    let Json(body) = body?;
    validation::validate_required("action", &body.action)?;
    let action: AdminAction = body
        .action
        .trim()
        .parse()
        .map_err(|e: crate::domain::ParseEnumError| AppError::Validation(e.to_string()))?;

    tracing::info!(admin_id = %admin.user_id, transaction_id = %id, action = %action, "Admin transaction action");

    let outcome = state.machine.apply_action(id, action).await?;
    Ok(Json(UpdateTransactionResponse {
        success: true,
        new_status: outcome.new_status,
        tracking_number: outcome.tracking_number,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/refresh-swap",
    params(("id" = Uuid, Path, description = "Swap transaction id")),
    responses(
        (status = 200, description = "Conversion status applied", body = RefreshSwapResponse),
        (status = 400, description = "Transaction has no pending conversion"),
        (status = 404, description = "Transaction not found"),
        (status = 502, description = "Swap provider failed")
    ),
    tag = "Transactions"
)]
pub async fn refresh_swap(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<RefreshSwapResponse>, AppError> {
    let refreshed = state.machine.refresh_swap(id).await?;
    Ok(Json(RefreshSwapResponse {
        success: true,
        new_status: refreshed.status,
        changed: refreshed.changed,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/transactions/list",
    params(Pagination),
    responses(
        (status = 200, description = "Transactions, newest first", body = TransactionListResponse),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Not an admin")
    ),
    tag = "Transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<TransactionListResponse>, AppError> {
    let (limit, offset) = pagination.resolve();
    let transactions = state.repos.transactions.list(limit, offset).await?;
    Ok(Json(TransactionListResponse { transactions }))
}

#[utoipa::path(
    get,
    path = "/admin/transactions/{id}/ledger",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Ledger entries, oldest first", body = LedgerResponse),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Transactions"
)]
pub async fn transaction_ledger(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<LedgerResponse>, AppError> {
    let tx = state.repos.transactions.get_by_id(id).await?;
    let entries = state.repos.ledger.list_for_transaction(tx.id).await?;
    Ok(Json(LedgerResponse {
        transaction_id: tx.id,
        entries,
    }))
}
