//! Shared HTTP transport for the provider clients: one `reqwest` client with a
//! request timeout, guarded by a consecutive-failure circuit breaker.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ProviderError, CODE_TRANSPORT};

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_PREVIEW: usize = 200;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Clone)]
pub struct ProviderTransport {
    provider: &'static str,
    client: Client,
    circuit_breaker: Breaker,
}

impl ProviderTransport {
    pub fn new(provider: &'static str, timeout: Duration) -> Self {
        Self::with_circuit_breaker(
            provider,
            timeout,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_RESET_TIMEOUT_SECS,
        )
    }

    pub fn with_circuit_breaker(
        provider: &'static str,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            provider,
            client,
            circuit_breaker,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// "closed" or "open".
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Sends the request and decodes a 2xx JSON body into `T`. Transport
    /// failures, non-2xx statuses and undecodable bodies all come back as
    /// [`ProviderError`].
    pub async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let provider = self.provider;
        let body = self.send(request).await?;
        serde_json::from_str::<T>(&body).map_err(|e| ProviderError::malformed(provider, e.to_string()))
    }

    /// Connectivity check: sends the request and only looks for a 2xx
    /// status. The body may be anything, including empty.
    pub async fn check_reachable(&self, request: RequestBuilder) -> Result<(), ProviderError> {
        tracing::debug!(provider = self.provider, circuit = self.circuit_state(), "Checking provider connectivity");
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let provider = self.provider;

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| transport_error(provider, e))?;

                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| transport_error(provider, e))?;

                if !status.is_success() {
                    return Err(ProviderError::new(
                        provider,
                        format!("http_{}", status.as_u16()),
                        error_message(&body),
                    ));
                }
                Ok(body)
            })
            .await;

        match result {
            Ok(body) => Ok(body),
            Err(FailsafeError::Rejected) => Err(ProviderError::circuit_open(provider)),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(provider, code = %e.code, message = %e.message, "Provider call failed");
                Err(e)
            }
        }
    }
}

fn transport_error(provider: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(provider)
    } else {
        ProviderError::new(provider, CODE_TRANSPORT, err.to_string())
    }
}

/// Pulls `error.message` or `message` out of a JSON error body, falling back to
/// a short preview of the raw body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}
