use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

const REDACTED: &str = "[redacted]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Service configuration, resolved once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Secret,
    pub database_max_connections: u32,
    pub session_secret: Secret,
    pub log_format: LogFormat,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub timeout: Duration,
    pub amlbot: AmlBotConfig,
    pub bitso: BitsoConfig,
    pub infinitus: InfinitusConfig,
    pub turnkey: TurnkeyConfig,
}

#[derive(Debug, Clone)]
pub struct AmlBotConfig {
    pub base_url: String,
    pub api_key: Secret,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BitsoConfig {
    pub base_url: String,
    pub api_key: Secret,
    pub api_secret: Secret,
}

#[derive(Debug, Clone)]
pub struct InfinitusConfig {
    pub base_url: String,
    pub api_key: Secret,
}

#[derive(Debug, Clone)]
pub struct TurnkeyConfig {
    pub base_url: String,
    pub organization_id: String,
    pub api_public_key: String,
    pub api_private_key: Secret,
}

/// String that never shows up in `Debug` output and has no `Display`;
/// read it with [`Secret::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl AsRef<str> for Secret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; every required key is checked
    /// here so a missing one fails startup rather than the first request.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required environment variable {}", key))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let log_format = match optional("LOG_FORMAT", "text").to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => return Err(anyhow!("LOG_FORMAT must be 'text' or 'json', got '{}'", other)),
        };

        let timeout_secs: u64 = optional("PROVIDER_TIMEOUT_SECS", "30")
            .parse()
            .context("PROVIDER_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Config {
            server_port: optional("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: Secret::new(required("DATABASE_URL")?),
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", "5")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            session_secret: Secret::new(required("SESSION_SECRET")?),
            log_format,
            providers: ProvidersConfig {
                timeout: Duration::from_secs(timeout_secs),
                amlbot: AmlBotConfig {
                    base_url: optional("AML_BOT_BASE_URL", "https://kyc-api.amlbot.com"),
                    api_key: Secret::new(required("AML_BOT_API_KEY")?),
                    callback_url: lookup("AML_BOT_CALLBACK_URL").filter(|v| !v.trim().is_empty()),
                },
                bitso: BitsoConfig {
                    base_url: optional("BITSO_API_URL", "https://api.bitso.com"),
                    api_key: Secret::new(required("BITSO_API_KEY")?),
                    api_secret: Secret::new(required("BITSO_API_SECRET")?),
                },
                infinitus: InfinitusConfig {
                    base_url: required("INFINITUS_BASE_URL")?,
                    api_key: Secret::new(required("INFINITUS_API_KEY")?),
                },
                turnkey: TurnkeyConfig {
                    base_url: optional("TURNKEY_BASE_URL", "https://api.turnkey.com"),
                    organization_id: required("TURNKEY_ORGANIZATION_ID")?,
                    api_public_key: required("TURNKEY_API_PUBLIC_KEY")?,
                    api_private_key: Secret::new(required("TURNKEY_API_PRIVATE_KEY")?),
                },
            },
        })
    }
}
