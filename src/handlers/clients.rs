use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::CustodyWallet;
use crate::error::AppError;
use crate::middleware::AdminSession;
use crate::AppState;

pub fn client_routes() -> Router<AppState> {
    Router::new().route("/admin/clients/:user_id/wallet", post(provision_wallet))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub success: bool,
    pub created: bool,
    pub wallet: CustodyWallet,
}

#[utoipa::path(
    post,
    path = "/admin/clients/{user_id}/wallet",
    params(("user_id" = Uuid, Path, description = "Client user id")),
    responses(
        (status = 201, description = "Wallet created at the custody provider", body = WalletResponse),
        (status = 200, description = "Client already has a wallet", body = WalletResponse),
        (status = 400, description = "Client KYC is not approved"),
        (status = 404, description = "Client has no KYC record"),
        (status = 502, description = "Custody provider failed")
    ),
    tag = "Clients"
)]
pub async fn provision_wallet(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(user_id): Path<Uuid>,
) -> Result<(StatusCode, Json<WalletResponse>), AppError> {
    tracing::info!(admin_id = %admin.user_id, user_id = %user_id, "Admin wallet provisioning");
    let (wallet, created) = state.wallets.provision(user_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(WalletResponse {
            success: true,
            created,
            wallet,
        }),
    ))
}
