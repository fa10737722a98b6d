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
use crate::domain::{KycRecord, KycStatus, ParseEnumError};
use crate::error::AppError;
use crate::middleware::AdminSession;
use crate::validation;
use crate::AppState;

pub fn kyc_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/kyc/list", get(list_kyc))
        .route("/admin/kyc/:id/update-status", post(update_kyc_status))
        .route("/admin/kyc/:id/verify", post(start_verification))
        .route("/admin/kyc/:id/sync", post(sync_verification))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateKycStatusRequest {
    /// `under_review`, `approved` or `rejected`.
    #[serde(default)]
    pub status: String,
    /// Reviewer comments; appended to the record's history on rejection.
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartVerificationRequest {
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateKycStatusResponse {
    pub success: bool,
    pub status: KycStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KycRecordResponse {
    pub success: bool,
    pub kyc_record: KycRecord,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KycListResponse {
    pub kyc_records: Vec<KycRecord>,
}

#[utoipa::path(
    post,
    path = "/admin/kyc/{id}/update-status",
    params(("id" = Uuid, Path, description = "KYC record id")),
    request_body = UpdateKycStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateKycStatusResponse),
        (status = 400, description = "Unknown status or record already approved"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "KYC record not found")
    ),
    tag = "KYC"
)]
pub async fn update_kyc_status(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateKycStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateKycStatusResponse>, AppError> {
    let Json(body) = body?;
    validation::validate_required("status", &body.status)?;
    let status: KycStatus = body
        .status
        .trim()
        .parse()
        .map_err(|e: ParseEnumError| AppError::Validation(e.to_string()))?;
    let notes: Vec<String> = body
        .notes
        .iter()
        .map(|n| validation::sanitize_string(n))
        .filter(|n| !n.is_empty())
        .collect();

    tracing::info!(admin_id = %admin.user_id, kyc_id = %id, status = %status, "Admin KYC review");

    let record = state.kyc_review.update_status(id, status, notes).await?;
    Ok(Json(UpdateKycStatusResponse {
        success: true,
        status: record.status,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/kyc/list",
    params(Pagination),
    responses(
        (status = 200, description = "KYC records with documents, newest first", body = KycListResponse),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Not an admin")
    ),
    tag = "KYC"
)]
pub async fn list_kyc(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(pagination): Query<Pagination>,
) -> Result<Json<KycListResponse>, AppError> {
    let (limit, offset) = pagination.resolve();
    let kyc_records = state.repos.kyc.list(limit, offset).await?;
    Ok(Json(KycListResponse { kyc_records }))
}

#[utoipa::path(
    post,
    path = "/admin/kyc/{id}/verify",
    params(("id" = Uuid, Path, description = "KYC record id")),
    request_body = StartVerificationRequest,
    responses(
        (status = 200, description = "Verification opened at the KYC provider", body = KycRecordResponse),
        (status = 400, description = "Record is not pending"),
        (status = 502, description = "KYC provider failed")
    ),
    tag = "KYC"
)]
pub async fn start_verification(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
    body: Result<Json<StartVerificationRequest>, JsonRejection>,
) -> Result<Json<KycRecordResponse>, AppError> {
    // The body is optional; without one the default verification types apply.
    let types = match body {
        Ok(Json(b)) => b.types,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) => return Err(rejection.into()),
    };
    let kyc_record = state.kyc_review.start_verification(id, types).await?;
    Ok(Json(KycRecordResponse {
        success: true,
        kyc_record,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/kyc/{id}/sync",
    params(("id" = Uuid, Path, description = "KYC record id")),
    responses(
        (status = 200, description = "Provider result applied", body = KycRecordResponse),
        (status = 400, description = "Record approved or has no verification"),
        (status = 502, description = "KYC provider failed")
    ),
    tag = "KYC"
)]
pub async fn sync_verification(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<KycRecordResponse>, AppError> {
    let kyc_record = state.kyc_review.sync_verification(id).await?;
    Ok(Json(KycRecordResponse {
        success: true,
        kyc_record,
    }))
}
