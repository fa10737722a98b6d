//! Bitso currency conversion client.
//! Requests are signed `Bitso {key}:{nonce}:{hex(HMAC-SHA256(nonce + method + path + body))}`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    hmac_sha256_hex, ConversionStatus, ProviderError, ProviderTransport, SwapConversion,
    SwapProvider, SwapQuote,
};
use crate::config::BitsoConfig;

const PROVIDER: &str = "bitso";
const CONVERSIONS_PATH: &str = "/api/v4/currency_conversions";
const BALANCE_PATH: &str = "/api/v3/balance/";
const AMOUNT_SCALE: i64 = 8;

#[derive(Debug, Deserialize)]
struct BitsoApiError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitsoEnvelope<T> {
    success: bool,
    payload: Option<T>,
    error: Option<BitsoApiError>,
}

impl<T> BitsoEnvelope<T> {
    fn into_payload(self) -> Result<T, ProviderError> {
        if !self.success {
            let error = self.error.unwrap_or(BitsoApiError {
                code: None,
                message: None,
            });
            return Err(ProviderError::new(
                PROVIDER,
                error.code.unwrap_or_else(|| "rejected".to_string()),
                error.message.unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        self.payload
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing payload"))
    }
}

#[derive(Debug, Deserialize)]
struct BitsoQuote {
    id: String,
    from_amount: BigDecimal,
    to_amount: BigDecimal,
    rate: BigDecimal,
    /// Milliseconds since the epoch.
    expires: i64,
}

#[derive(Debug, Deserialize)]
struct BitsoConversion {
    id: String,
    status: ConversionStatus,
}

#[derive(Clone)]
pub struct BitsoClient {
    config: BitsoConfig,
    transport: ProviderTransport,
}

impl BitsoClient {
    pub fn new(config: BitsoConfig, timeout: Duration) -> Self {
        Self {
            config,
            transport: ProviderTransport::new(PROVIDER, timeout),
        }
    }

    fn authorization(&self, method: &str, path: &str, body: &str) -> Result<String, ProviderError> {
        let nonce = Utc::now().timestamp_millis().to_string();
        sign_request(
            self.config.api_key.expose(),
            self.config.api_secret.expose(),
            &nonce,
            method,
            path,
            body,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

pub(crate) fn sign_request(
    key: &str,
    secret: &str,
    nonce: &str,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, ProviderError> {
    let message = format!("{}{}{}{}", nonce, method, path, body);
    let signature = hmac_sha256_hex(secret.as_bytes(), message.as_bytes())
        .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;
    Ok(format!("Bitso {}:{}:{}", key, nonce, signature))
}

#[async_trait]
impl SwapProvider for BitsoClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn quote(
        &self,
        from_currency: &str,
        to_currency: &str,
        amount: &BigDecimal,
    ) -> Result<SwapQuote, ProviderError> {
        let body = json!({
            "from_currency": from_currency.to_lowercase(),
            "to_currency": to_currency.to_lowercase(),
            "spend_amount": amount.with_scale(AMOUNT_SCALE).to_string(),
        })
        .to_string();

        tracing::info!(provider = PROVIDER, from_currency, to_currency, amount = %amount, "Requesting quote");

        let request = self
            .transport
            .client()
            .post(self.url(CONVERSIONS_PATH))
            .header("Authorization", self.authorization("POST", CONVERSIONS_PATH, &body)?)
            .header("Content-Type", "application/json")
            .body(body);

        let quote = self
            .transport
            .send_json::<BitsoEnvelope<BitsoQuote>>(request)
            .await?
            .into_payload()?;

        let expires_at = Utc
            .timestamp_millis_opt(quote.expires)
            .single()
            .ok_or_else(|| ProviderError::malformed(PROVIDER, format!("bad expiry {}", quote.expires)))?;

        Ok(SwapQuote {
            quote_id: quote.id,
            rate: quote.rate,
            from_amount: quote.from_amount,
            to_amount: quote.to_amount,
            expires_at,
        })
    }

    async fn execute(&self, quote_id: &str) -> Result<SwapConversion, ProviderError> {
        let path = format!("{}/{}", CONVERSIONS_PATH, quote_id);

        tracing::info!(provider = PROVIDER, quote_id, "Executing quote");

        let request = self
            .transport
            .client()
            .put(self.url(&path))
            .header("Authorization", self.authorization("PUT", &path, "")?);

        let conversion = self
            .transport
            .send_json::<BitsoEnvelope<BitsoConversion>>(request)
            .await?
            .into_payload()?;

        if matches!(conversion.status, ConversionStatus::Failed | ConversionStatus::Cancelled) {
            return Err(ProviderError::new(
                PROVIDER,
                "conversion_failed",
                format!("conversion {} ended {:?}", conversion.id, conversion.status),
            ));
        }

        Ok(SwapConversion {
            conversion_id: conversion.id,
            status: conversion.status,
        })
    }

    async fn conversion_status(&self, conversion_id: &str) -> Result<SwapConversion, ProviderError> {
        let path = format!("{}/{}", CONVERSIONS_PATH, conversion_id);

        let request = self
            .transport
            .client()
            .get(self.url(&path))
            .header("Authorization", self.authorization("GET", &path, "")?);

        let conversion = self
            .transport
            .send_json::<BitsoEnvelope<BitsoConversion>>(request)
            .await?
            .into_payload()?;

        Ok(SwapConversion {
            conversion_id: conversion.id,
            status: conversion.status,
        })
    }

    /// Signed balance read; a rejected envelope means bad credentials.
    async fn ping(&self) -> Result<(), ProviderError> {
        let request = self
            .transport
            .client()
            .get(self.url(BALANCE_PATH))
            .header("Authorization", self.authorization("GET", BALANCE_PATH, "")?);

        self.transport
            .send_json::<BitsoEnvelope<serde_json::Value>>(request)
            .await?
            .into_payload()
            .map(|_| ())
    }
}
