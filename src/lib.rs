pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod services;
pub mod validation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Secret;
use crate::health::DependencyChecker;
use crate::ports::Repositories;
use crate::providers::Providers;
use crate::services::{DashboardService, KycReviewFlow, TransactionStateMachine, WalletProvisioning};

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub machine: TransactionStateMachine,
    pub kyc_review: KycReviewFlow,
    pub wallets: WalletProvisioning,
    pub dashboard: DashboardService,
    pub providers: Providers,
    pub session_secret: Secret,
    pub health_checks: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        providers: Providers,
        session_secret: Secret,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            machine: TransactionStateMachine::new(repos.clone(), providers.clone(), provider_timeout),
            kyc_review: KycReviewFlow::new(repos.clone(), providers.clone(), provider_timeout),
            wallets: WalletProvisioning::new(repos.clone(), providers.clone(), provider_timeout),
            dashboard: DashboardService::new(repos.clone()),
            providers,
            repos,
            session_secret,
            health_checks: Arc::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub fn with_health_checks(mut self, checks: Vec<Arc<dyn DependencyChecker>>) -> Self {
        self.health_checks = Arc::new(checks);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .merge(handlers::transactions::transaction_routes())
        .merge(handlers::payouts::payout_routes())
        .merge(handlers::kyc::kyc_routes())
        .merge(handlers::dashboard::dashboard_routes())
        .merge(handlers::clients::client_routes())
        .merge(handlers::integrations::integration_routes())
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
