pub mod clients;
pub mod dashboard;
pub mod integrations;
pub mod kyc;
pub mod payouts;
pub mod transactions;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use crate::health::{self, HealthResponse};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// `(limit, offset)` clamped to sane bounds.
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = health::check_health(&state.health_checks, state.started_at).await;
    let status_code = if response.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        transactions::update_transaction,
        transactions::list_transactions,
        transactions::transaction_ledger,
        transactions::refresh_swap,
        payouts::send_payout,
        payouts::refresh_payout,
        payouts::list_payouts,
        kyc::update_kyc_status,
        kyc::list_kyc,
        kyc::start_verification,
        kyc::sync_verification,
        dashboard::dashboard_stats,
        clients::provision_wallet,
        integrations::test_integration,
    ),
    components(schemas(
        crate::health::HealthResponse,
        crate::health::DependencyStatus,
        crate::domain::Transaction,
        crate::domain::TransactionType,
        crate::domain::TransactionStatus,
        crate::domain::LedgerEntry,
        crate::domain::PayoutRequest,
        crate::domain::PayoutStatus,
        crate::domain::Recipient,
        crate::domain::KycRecord,
        crate::domain::KycDocument,
        crate::domain::KycStatus,
        crate::domain::CustodyWallet,
        crate::domain::WalletAddress,
        crate::domain::Chain,
        crate::services::dashboard::DashboardCounts,
        crate::services::DashboardStats,
        transactions::UpdateTransactionRequest,
        transactions::UpdateTransactionResponse,
        transactions::TransactionListResponse,
        transactions::LedgerResponse,
        transactions::RefreshSwapResponse,
        payouts::SendPayoutResponse,
        payouts::RefreshPayoutResponse,
        payouts::PayoutListResponse,
        kyc::UpdateKycStatusRequest,
        kyc::StartVerificationRequest,
        kyc::UpdateKycStatusResponse,
        kyc::KycRecordResponse,
        kyc::KycListResponse,
        clients::WalletResponse,
        integrations::IntegrationTestResponse,
        crate::providers::Integration,
    )),
    tags(
        (name = "Transactions", description = "Transaction lifecycle actions"),
        (name = "Payouts", description = "Outbound bank transfers"),
        (name = "KYC", description = "KYC review"),
        (name = "Dashboard", description = "Admin dashboard"),
        (name = "Clients", description = "Client custody wallets"),
        (name = "Integrations", description = "Provider connectivity"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;
