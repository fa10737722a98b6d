use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remit_core::adapters::{postgres, PostgresStore};
use remit_core::cli::{self, Cli, Commands, DbCommands, SessionCommands};
use remit_core::config::{Config, LogFormat};
use remit_core::health::{DependencyChecker, PostgresChecker, ProviderChecker};
use remit_core::ports::Repositories;
use remit_core::providers::Providers;
use remit_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Session(SessionCommands::Issue { user_id }) => {
            cli::handle_session_issue(&config, user_id)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = postgres::create_pool(
        config.database_url.expose(),
        config.database_max_connections,
    )
    .await?;
    postgres::run_migrations(&pool).await?;

    let store = Arc::new(PostgresStore::new(pool));
    let mut health_checks: Vec<Arc<dyn DependencyChecker>> =
        vec![Arc::new(PostgresChecker::new(store.pool().clone()))];
    let repos = Repositories::from_store(store);

    let providers = Providers::http(&config.providers);
    health_checks.extend(ProviderChecker::all(&providers));
    tracing::info!(
        timeout_secs = config.providers.timeout.as_secs(),
        "Provider clients initialized"
    );

    let state = AppState::new(
        repos,
        providers,
        config.session_secret.clone(),
        config.providers.timeout,
    )
    .with_health_checks(health_checks);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
