use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use utoipa::ToSchema;

use crate::providers::{Integration, Providers};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: BTreeMap<String, DependencyStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DependencyStatus::Healthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reachability of one external provider, through its authenticated ping.
pub struct ProviderChecker {
    providers: Providers,
    integration: Integration,
}

impl ProviderChecker {
    pub fn new(providers: Providers, integration: Integration) -> Self {
        Self {
            providers,
            integration,
        }
    }

    /// One checker per provider slot.
    pub fn all(providers: &Providers) -> Vec<Arc<dyn DependencyChecker>> {
        Integration::ALL
            .into_iter()
            .map(|integration| {
                Arc::new(ProviderChecker::new(providers.clone(), integration)) as Arc<dyn DependencyChecker>
            })
            .collect()
    }
}

#[async_trait]
impl DependencyChecker for ProviderChecker {
    fn name(&self) -> &'static str {
        self.providers.name(self.integration)
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.providers.ping(self.integration).await {
            Ok(()) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::unhealthy(e.code),
        }
    }
}

/// Runs every checker concurrently, each bounded by a short timeout.
pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    started_at: Instant,
) -> HealthResponse {
    let results = run_checks(checkers).await;

    let status = if results.values().all(DependencyStatus::is_healthy) {
        "healthy"
    } else {
        "unhealthy"
    };

    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: started_at.elapsed().as_secs(),
        dependencies: results,
    }
}

/// A single check, bounded by the same timeout `/health` uses.
pub async fn run_check(checker: &dyn DependencyChecker) -> DependencyStatus {
    timeout(CHECK_TIMEOUT, checker.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"))
}

async fn run_checks(checkers: &[Arc<dyn DependencyChecker>]) -> BTreeMap<String, DependencyStatus> {
    let mut set = tokio::task::JoinSet::new();
    for checker in checkers {
        let checker = checker.clone();
        set.spawn(async move {
            let status = run_check(checker.as_ref()).await;
            (checker.name(), status)
        });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((name, status)) => {
                results.insert(name.to_string(), status);
            }
            Err(e) => tracing::error!(error = %e, "Health check task failed"),
        }
    }
    results
}
