use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::postgres;
use crate::config::Config;
use crate::middleware::auth::issue_session_token;

#[derive(Parser)]
#[command(name = "remit-core")]
#[command(about = "Remit Core - cross-border transfer admin service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Admin session commands
    #[command(subcommand)]
    Session(SessionCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Mint a session token for an admin user
    Issue {
        /// Auth platform user UUID
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = postgres::create_pool(
        config.database_url.expose(),
        config.database_max_connections,
    )
    .await?;

    tracing::info!("Running database migrations...");
    postgres::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(config.database_url.expose()));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Provider Timeout: {}s", config.providers.timeout.as_secs());
    println!("  AMLBot URL: {}", config.providers.amlbot.base_url);
    println!("  Bitso URL: {}", config.providers.bitso.base_url);
    println!("  Infinitus URL: {}", config.providers.infinitus.base_url);
    println!("  Turnkey URL: {}", config.providers.turnkey.base_url);
    println!("  Turnkey Organization: {}", config.providers.turnkey.organization_id);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub fn handle_session_issue(config: &Config, user_id: Uuid) -> anyhow::Result<()> {
    let token = issue_session_token(&config.session_secret, user_id)?;
    tracing::info!(user_id = %user_id, "Session token issued");
    println!("{}", token);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
