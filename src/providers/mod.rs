//! Provider adapters.
//! One trait per external financial API. Implementations map domain fields to
//! the provider's wire shape and fold every failure into [`ProviderError`].
//! Nothing in here retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::ProvidersConfig;
use crate::domain::{Chain, KycStatus, Recipient, WalletAddress};

pub mod amlbot;
pub mod bitso;
pub mod http;
pub mod infinitus;
pub mod turnkey;

pub use amlbot::AmlBotClient;
pub use bitso::BitsoClient;
pub use http::ProviderTransport;
pub use infinitus::InfinitusClient;
pub use turnkey::TurnkeyClient;

pub const CODE_TIMEOUT: &str = "timeout";
pub const CODE_QUOTE_EXPIRED: &str = "quote_expired";
pub const CODE_CIRCUIT_OPEN: &str = "circuit_open";
pub const CODE_INVALID_REQUEST: &str = "invalid_request";
pub const CODE_MALFORMED: &str = "malformed_response";
pub const CODE_TRANSPORT: &str = "transport";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} [{code}]: {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn timeout(provider: &'static str) -> Self {
        Self::new(provider, CODE_TIMEOUT, "request timed out")
    }

    pub fn quote_expired(provider: &'static str, quote_id: &str) -> Self {
        Self::new(provider, CODE_QUOTE_EXPIRED, format!("quote {} expired before execution", quote_id))
    }

    pub fn circuit_open(provider: &'static str) -> Self {
        Self::new(provider, CODE_CIRCUIT_OPEN, "circuit breaker is open")
    }

    pub fn invalid_request(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, CODE_INVALID_REQUEST, message)
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, CODE_MALFORMED, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == CODE_TIMEOUT
    }
}

/// Hex-encoded HMAC-SHA256, used by the request signers and session tokens.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Bounds a provider call by `timeout`; an elapsed call becomes a timeout
/// error. The call is dropped, not retried.
pub async fn with_timeout<T, F>(provider: &'static str, timeout: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(provider, timeout_secs = timeout.as_secs(), "Provider call timed out");
            Err(ProviderError::timeout(provider))
        }
    }
}

// --- Payout ---

/// Outbound bank transfer. `reference` doubles as the idempotency key.
#[derive(Debug, Clone)]
pub struct PayoutOrder {
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub recipient: Recipient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub provider_request_id: String,
    pub tracking_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderPayoutState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutStatusReport {
    pub provider_request_id: String,
    pub state: ProviderPayoutState,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait PayoutProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, order: &PayoutOrder) -> Result<PayoutReceipt, ProviderError>;

    async fn status(&self, provider_request_id: &str) -> Result<PayoutStatusReport, ProviderError>;

    /// Cheap authenticated call confirming the provider is reachable and
    /// accepts our credentials.
    async fn ping(&self) -> Result<(), ProviderError>;
}

// --- Swap ---

#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub quote_id: String,
    pub rate: BigDecimal,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub expires_at: DateTime<Utc>,
}

impl SwapQuote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConversion {
    pub conversion_id: String,
    pub status: ConversionStatus,
}

#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(
        &self,
        from_currency: &str,
        to_currency: &str,
        amount: &BigDecimal,
    ) -> Result<SwapQuote, ProviderError>;

    async fn execute(&self, quote_id: &str) -> Result<SwapConversion, ProviderError>;

    /// Current state of a conversion returned by [`SwapProvider::execute`].
    /// Failed conversions come back as a status, not an error.
    async fn conversion_status(&self, conversion_id: &str) -> Result<SwapConversion, ProviderError>;

    /// Cheap authenticated call confirming the provider is reachable and
    /// accepts our credentials.
    async fn ping(&self) -> Result<(), ProviderError>;
}

// --- KYC ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicantType {
    Person,
    Company,
}

#[derive(Debug, Clone)]
pub struct ApplicantRequest {
    pub external_id: String,
    pub applicant_type: ApplicantType,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    Approved,
    Declined,
    ReviewNeeded,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub verification_id: String,
    pub status: String,
    pub result: Option<VerificationResult>,
}

impl VerificationReport {
    /// approved -> approved, declined -> rejected, anything else -> under_review.
    pub fn kyc_status(&self) -> KycStatus {
        match self.result {
            Some(VerificationResult::Approved) => KycStatus::Approved,
            Some(VerificationResult::Declined) => KycStatus::Rejected,
            _ => KycStatus::UnderReview,
        }
    }
}

#[async_trait]
pub trait KycProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_applicant(&self, request: &ApplicantRequest) -> Result<String, ProviderError>;

    async fn create_verification(
        &self,
        applicant_id: &str,
        types: &[String],
    ) -> Result<String, ProviderError>;

    async fn get_verification(&self, verification_id: &str) -> Result<VerificationReport, ProviderError>;

    /// Cheap authenticated call confirming the provider is reachable and
    /// accepts our credentials.
    async fn ping(&self) -> Result<(), ProviderError>;
}

// --- Custody ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWallet {
    pub wallet_id: String,
    pub addresses: Vec<WalletAddress>,
}

#[async_trait]
pub trait CustodyProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One wallet holding one address per requested chain.
    async fn create_wallet(&self, wallet_name: &str, chains: &[Chain]) -> Result<CreatedWallet, ProviderError>;

    /// Cheap authenticated call confirming the provider is reachable and
    /// accepts our credentials.
    async fn ping(&self) -> Result<(), ProviderError>;
}

/// Which provider slot a connectivity check targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Integration {
    Payout,
    Swap,
    Kyc,
    Custody,
}

impl Integration {
    pub const ALL: [Integration; 4] = [
        Integration::Payout,
        Integration::Swap,
        Integration::Kyc,
        Integration::Custody,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Integration::Payout => "payout",
            Integration::Swap => "swap",
            Integration::Kyc => "kyc",
            Integration::Custody => "custody",
        }
    }
}

impl std::fmt::Display for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Integration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Integration::ALL
            .into_iter()
            .find(|integration| integration.as_str() == s)
            .ok_or_else(|| format!("unknown integration: {}", s))
    }
}

/// Every provider adapter, injected into the services.
#[derive(Clone)]
pub struct Providers {
    pub payout: Arc<dyn PayoutProvider>,
    pub swap: Arc<dyn SwapProvider>,
    pub kyc: Arc<dyn KycProvider>,
    pub custody: Arc<dyn CustodyProvider>,
}

impl Providers {
    /// Builds the HTTP-backed adapters from resolved configuration.
    pub fn http(config: &ProvidersConfig) -> Self {
        Self {
            payout: Arc::new(InfinitusClient::new(config.infinitus.clone(), config.timeout)),
            swap: Arc::new(BitsoClient::new(config.bitso.clone(), config.timeout)),
            kyc: Arc::new(AmlBotClient::new(config.amlbot.clone(), config.timeout)),
            custody: Arc::new(TurnkeyClient::new(config.turnkey.clone(), config.timeout)),
        }
    }

    pub fn name(&self, integration: Integration) -> &'static str {
        match integration {
            Integration::Payout => self.payout.name(),
            Integration::Swap => self.swap.name(),
            Integration::Kyc => self.kyc.name(),
            Integration::Custody => self.custody.name(),
        }
    }

    pub async fn ping(&self, integration: Integration) -> Result<(), ProviderError> {
        match integration {
            Integration::Payout => self.payout.ping().await,
            Integration::Swap => self.swap.ping().await,
            Integration::Kyc => self.kyc.ping().await,
            Integration::Custody => self.custody.ping().await,
        }
    }
}
