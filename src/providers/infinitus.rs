//! Infinitus payout rail client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    PayoutOrder, PayoutProvider, PayoutReceipt, PayoutStatusReport, ProviderError,
    ProviderPayoutState, ProviderTransport,
};
use crate::config::InfinitusConfig;
use crate::validation;

const PROVIDER: &str = "infinitus";
const PAYOUTS_PATH: &str = "/api/v1/payouts";
const HEALTH_PATH: &str = "/health";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfinitusPayout {
    id: String,
    status: ProviderPayoutState,
    tracking_number: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfinitusApiError {
    code: Option<String>,
    message: Option<String>,
}

/// Infinitus answers either `{"data": {...}}` or the bare payout, and may
/// report a business error inside a 2xx body.
#[derive(Debug, Deserialize)]
struct InfinitusEnvelope {
    data: Option<serde_json::Value>,
    error: Option<InfinitusApiError>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl InfinitusEnvelope {
    fn into_payout(self) -> Result<InfinitusPayout, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::new(
                PROVIDER,
                error.code.unwrap_or_else(|| "rejected".to_string()),
                error.message.unwrap_or_else(|| "payout rejected".to_string()),
            ));
        }
        let value = match self.data {
            Some(data) => data,
            None => serde_json::Value::Object(self.rest),
        };
        serde_json::from_value(value).map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))
    }
}

#[derive(Clone)]
pub struct InfinitusClient {
    config: InfinitusConfig,
    transport: ProviderTransport,
}

impl InfinitusClient {
    pub fn new(config: InfinitusConfig, timeout: Duration) -> Self {
        Self {
            config,
            transport: ProviderTransport::new(PROVIDER, timeout),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PayoutProvider for InfinitusClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn send(&self, order: &PayoutOrder) -> Result<PayoutReceipt, ProviderError> {
        validation::validate_recipient(&order.recipient, &order.currency)
            .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;

        let recipient = &order.recipient;
        let body = json!({
            "amount": order.amount.to_string(),
            "currency": order.currency,
            "recipient": {
                "name": recipient.name,
                "bank_name": recipient.bank_name,
                "bank_code": recipient.bank_code,
                "account_number": recipient.account,
                "account_type": "checking",
                "country": recipient.country,
            },
            "reference": order.reference,
        });

        tracing::info!(
            provider = PROVIDER,
            reference = %order.reference,
            currency = %order.currency,
            country = %recipient.country,
            "Creating payout"
        );

        let request = self
            .transport
            .client()
            .post(self.url(PAYOUTS_PATH))
            .bearer_auth(self.config.api_key.expose())
            .header("Idempotency-Key", &order.reference)
            .json(&body);

        let payout = self
            .transport
            .send_json::<InfinitusEnvelope>(request)
            .await?
            .into_payout()?;

        if matches!(payout.status, ProviderPayoutState::Failed | ProviderPayoutState::Cancelled) {
            return Err(ProviderError::new(
                PROVIDER,
                "payout_failed",
                payout
                    .error_message
                    .unwrap_or_else(|| "payout was not accepted".to_string()),
            ));
        }

        let tracking_number = payout.tracking_number.unwrap_or_else(|| payout.id.clone());
        Ok(PayoutReceipt {
            provider_request_id: payout.id,
            tracking_number,
        })
    }

    async fn status(&self, provider_request_id: &str) -> Result<PayoutStatusReport, ProviderError> {
        let request = self
            .transport
            .client()
            .get(self.url(&format!("{}/{}", PAYOUTS_PATH, provider_request_id)))
            .bearer_auth(self.config.api_key.expose());

        let payout = self
            .transport
            .send_json::<InfinitusEnvelope>(request)
            .await?
            .into_payout()?;

        Ok(PayoutStatusReport {
            provider_request_id: payout.id,
            state: payout.status,
            error_message: payout.error_message,
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let request = self
            .transport
            .client()
            .get(self.url(HEALTH_PATH))
            .bearer_auth(self.config.api_key.expose());
        self.transport.check_reachable(request).await
    }
}
