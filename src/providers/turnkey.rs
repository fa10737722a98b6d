//! Turnkey custody client. Creates one multi-chain wallet per client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{hmac_sha256_hex, CreatedWallet, CustodyProvider, ProviderError, ProviderTransport};
use crate::config::TurnkeyConfig;
use crate::domain::{Chain, WalletAddress};

const PROVIDER: &str = "turnkey";
const CREATE_WALLET_PATH: &str = "/public/v1/submit/create_wallet";
const LIST_WALLETS_PATH: &str = "/public/v1/query/list_wallets";
const STAMP_SCHEME: &str = "SIGNATURE_SCHEME_TK_API_P256";

#[derive(Debug, Deserialize)]
struct TurnkeyApiError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWalletResult {
    wallet_id: String,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    result: Option<CreateWalletResult>,
}

#[derive(Debug, Deserialize)]
struct TurnkeyResponse {
    activity: Option<Activity>,
    error: Option<TurnkeyApiError>,
}

/// Derivation parameters for one account of a given chain.
fn account_params(chain: Chain) -> serde_json::Value {
    let (curve, path, address_format) = match chain {
        Chain::Ethereum => ("CURVE_SECP256K1", "m/44'/60'/0'/0/0", "ADDRESS_FORMAT_ETHEREUM"),
        Chain::Solana => ("CURVE_ED25519", "m/44'/501'/0'/0'", "ADDRESS_FORMAT_SOLANA"),
        Chain::Tron => ("CURVE_SECP256K1", "m/44'/195'/0'/0/0", "ADDRESS_FORMAT_TRON"),
    };
    json!({
        "curve": curve,
        "pathFormat": "PATH_FORMAT_BIP32",
        "path": path,
        "addressFormat": address_format,
    })
}

#[derive(Clone)]
pub struct TurnkeyClient {
    config: TurnkeyConfig,
    transport: ProviderTransport,
}

impl TurnkeyClient {
    pub fn new(config: TurnkeyConfig, timeout: Duration) -> Self {
        Self {
            config,
            transport: ProviderTransport::new(PROVIDER, timeout),
        }
    }

    /// `X-Stamp` header: base64 JSON of the public key and the body signature.
    fn stamp(&self, body: &str) -> Result<String, ProviderError> {
        let signature = hmac_sha256_hex(self.config.api_private_key.as_bytes(), body.as_bytes())
            .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;
        let stamp = json!({
            "publicKey": self.config.api_public_key,
            "signature": signature,
            "scheme": STAMP_SCHEME,
        });
        Ok(STANDARD.encode(stamp.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CustodyProvider for TurnkeyClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_wallet(&self, wallet_name: &str, chains: &[Chain]) -> Result<CreatedWallet, ProviderError> {
        if chains.is_empty() {
            return Err(ProviderError::invalid_request(PROVIDER, "at least one chain is required"));
        }

        let accounts: Vec<serde_json::Value> = chains.iter().copied().map(account_params).collect();
        let body = json!({
            "type": "ACTIVITY_TYPE_CREATE_WALLET",
            "timestampMs": Utc::now().timestamp_millis().to_string(),
            "organizationId": self.config.organization_id,
            "parameters": {
                "walletName": wallet_name,
                "accounts": accounts,
            },
        })
        .to_string();

        let request = self
            .transport
            .client()
            .post(self.url(CREATE_WALLET_PATH))
            .header("Content-Type", "application/json")
            .header("X-Stamp", self.stamp(&body)?)
            .body(body);

        let response = self.transport.send_json::<TurnkeyResponse>(request).await?;
        if let Some(error) = response.error {
            return Err(ProviderError::new(
                PROVIDER,
                error.code.unwrap_or_else(|| "rejected".to_string()),
                error.message.unwrap_or_else(|| "wallet creation rejected".to_string()),
            ));
        }

        let result = response
            .activity
            .and_then(|activity| activity.result)
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing activity result"))?;

        if result.addresses.len() != chains.len() {
            return Err(ProviderError::malformed(
                PROVIDER,
                format!(
                    "expected {} addresses, got {}",
                    chains.len(),
                    result.addresses.len()
                ),
            ));
        }

        let addresses = chains
            .iter()
            .zip(result.addresses)
            .map(|(chain, address)| WalletAddress {
                chain: *chain,
                address,
            })
            .collect();

        tracing::info!(provider = PROVIDER, wallet_id = %result.wallet_id, "Wallet created");

        Ok(CreatedWallet {
            wallet_id: result.wallet_id,
            addresses,
        })
    }

    /// Stamped read-only query against the organization.
    async fn ping(&self) -> Result<(), ProviderError> {
        let body = json!({ "organizationId": self.config.organization_id }).to_string();
        let request = self
            .transport
            .client()
            .post(self.url(LIST_WALLETS_PATH))
            .header("Content-Type", "application/json")
            .header("X-Stamp", self.stamp(&body)?)
            .body(body);
        self.transport.check_reachable(request).await
    }
}
