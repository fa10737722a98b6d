//! AMLBot KYC verification client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    ApplicantRequest, ApplicantType, KycProvider, ProviderError, ProviderTransport,
    VerificationReport, VerificationResult,
};
use crate::config::AmlBotConfig;

const PROVIDER: &str = "amlbot";

#[derive(Debug, Deserialize)]
struct AmlBotApplicant {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AmlBotVerification {
    id: String,
    status: String,
    result: Option<VerificationResult>,
}

#[derive(Clone)]
pub struct AmlBotClient {
    config: AmlBotConfig,
    transport: ProviderTransport,
}

impl AmlBotClient {
    pub fn new(config: AmlBotConfig, timeout: Duration) -> Self {
        Self {
            config,
            transport: ProviderTransport::new(PROVIDER, timeout),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn token(&self) -> String {
        format!("Token {}", self.config.api_key.expose())
    }
}

#[async_trait]
impl KycProvider for AmlBotClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_applicant(&self, request: &ApplicantRequest) -> Result<String, ProviderError> {
        let applicant_type = match request.applicant_type {
            ApplicantType::Person => "PERSON",
            ApplicantType::Company => "COMPANY",
        };
        let body = json!({
            "type": applicant_type,
            "external_id": request.external_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
        });

        tracing::info!(provider = PROVIDER, external_id = %request.external_id, "Creating applicant");

        let http = self
            .transport
            .client()
            .post(self.url("/applicants"))
            .header("Authorization", self.token())
            .json(&body);

        let applicant = self.transport.send_json::<AmlBotApplicant>(http).await?;
        Ok(applicant.id)
    }

    async fn create_verification(
        &self,
        applicant_id: &str,
        types: &[String],
    ) -> Result<String, ProviderError> {
        let mut body = json!({
            "applicant_id": applicant_id,
            "types": types,
        });
        if let Some(callback_url) = &self.config.callback_url {
            body["callback_url"] = json!(callback_url);
        }

        let http = self
            .transport
            .client()
            .post(self.url("/verifications"))
            .header("Authorization", self.token())
            .json(&body);

        let verification = self.transport.send_json::<AmlBotVerification>(http).await?;
        tracing::info!(
            provider = PROVIDER,
            applicant_id,
            verification_id = %verification.id,
            "Verification created"
        );
        Ok(verification.id)
    }

    async fn get_verification(&self, verification_id: &str) -> Result<VerificationReport, ProviderError> {
        let http = self
            .transport
            .client()
            .get(self.url(&format!("/verifications/{}", verification_id)))
            .header("Authorization", self.token());

        let verification = self.transport.send_json::<AmlBotVerification>(http).await?;
        Ok(VerificationReport {
            verification_id: verification.id,
            status: verification.status,
            result: verification.result,
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let http = self
            .transport
            .client()
            .get(self.url("/forms"))
            .header("Authorization", self.token());
        self.transport.check_reachable(http).await
    }
}
