use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::health::{self, DependencyChecker, DependencyStatus, ProviderChecker};
use crate::middleware::AdminSession;
use crate::providers::Integration;
use crate::AppState;

pub fn integration_routes() -> Router<AppState> {
    Router::new().route("/admin/integrations/:integration/test", get(test_integration))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationTestResponse {
    pub integration: Integration,
    pub provider: String,
    pub connected: bool,
    pub result: DependencyStatus,
}

#[utoipa::path(
    get,
    path = "/admin/integrations/{integration}/test",
    params(("integration" = String, Path, description = "`payout`, `swap`, `kyc` or `custody`")),
    responses(
        (status = 200, description = "Connectivity result; `connected` is false when the provider is unreachable", body = IntegrationTestResponse),
        (status = 400, description = "Unknown integration"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Not an admin")
    ),
    tag = "Integrations"
)]
pub async fn test_integration(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(integration): Path<String>,
) -> Result<Json<IntegrationTestResponse>, AppError> {
    let integration: Integration = integration.trim().parse().map_err(AppError::Validation)?;

    let checker = ProviderChecker::new(state.providers.clone(), integration);
    let result = health::run_check(&checker).await;
    let connected = result.is_healthy();

    tracing::info!(
        admin_id = %admin.user_id,
        integration = %integration,
        provider = checker.name(),
        connected,
        "Provider connectivity tested"
    );

    Ok(Json(IntegrationTestResponse {
        integration,
        provider: checker.name().to_string(),
        connected,
        result,
    }))
}
