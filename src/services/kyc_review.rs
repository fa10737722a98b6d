//! KYC review flow: `pending -> under_review -> approved | rejected`.
//! Approved records are final; every status change is guarded on the status
//! that was read.

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::{KycRecord, KycStatus};
use crate::error::AppError;
use crate::ports::{KycUpdate, Repositories};
use crate::providers::{self, ApplicantRequest, ApplicantType, ProviderError, Providers};
use crate::validation;

pub const DEFAULT_VERIFICATION_TYPES: &[&str] = &["document", "selfie"];

#[derive(Clone)]
pub struct KycReviewFlow {
    repos: Repositories,
    providers: Providers,
    provider_timeout: Duration,
}

impl KycReviewFlow {
    pub fn new(repos: Repositories, providers: Providers, provider_timeout: Duration) -> Self {
        Self {
            repos,
            providers,
            provider_timeout,
        }
    }

    /// Entry point of the `update-status` admin action.
    pub async fn update_status(
        &self,
        kyc_id: Uuid,
        status: KycStatus,
        notes: Vec<String>,
    ) -> Result<KycRecord, AppError> {
        match status {
            KycStatus::Approved => self.approve(kyc_id).await,
            KycStatus::Rejected => self.reject(kyc_id, notes).await,
            KycStatus::UnderReview => self.mark_under_review(kyc_id, notes).await,
            KycStatus::Pending => Err(AppError::Validation(
                "status: a KYC record cannot be moved back to pending".to_string(),
            )),
        }
    }

    /// Notes are not recorded on approval.
    pub async fn approve(&self, kyc_id: Uuid) -> Result<KycRecord, AppError> {
        let record = self.reviewable(kyc_id).await?;
        self.transition(&record, KycStatus::Approved, Vec::new()).await
    }

    pub async fn reject(&self, kyc_id: Uuid, reasons: Vec<String>) -> Result<KycRecord, AppError> {
        validation::validate_notes(&reasons)?;
        let record = self.reviewable(kyc_id).await?;
        self.transition(&record, KycStatus::Rejected, reasons).await
    }

    pub async fn mark_under_review(
        &self,
        kyc_id: Uuid,
        notes: Vec<String>,
    ) -> Result<KycRecord, AppError> {
        validation::validate_notes(&notes)?;
        let record = self.repos.kyc.get_by_id(kyc_id).await?;
        if record.status != KycStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "KYC record {} is {}, only pending records can move to under_review",
                record.id, record.status
            )));
        }
        self.transition(&record, KycStatus::UnderReview, notes).await
    }

    /// Registers the client with the KYC provider and opens a verification.
    pub async fn start_verification(
        &self,
        kyc_id: Uuid,
        types: Option<Vec<String>>,
    ) -> Result<KycRecord, AppError> {
        let record = self.repos.kyc.get_by_id(kyc_id).await?;
        if record.status != KycStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "KYC record {} is {}, verification can only start from pending",
                record.id, record.status
            )));
        }
        let types = types
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_VERIFICATION_TYPES.iter().map(|t| t.to_string()).collect());

        let kyc = &self.providers.kyc;
        let applicant = ApplicantRequest {
            external_id: record.user_id.to_string(),
            applicant_type: ApplicantType::Person,
            first_name: None,
            last_name: None,
            email: None,
        };
        let applicant_id = self.bounded(kyc.name(), kyc.create_applicant(&applicant)).await?;
        let verification_id = self
            .bounded(kyc.name(), kyc.create_verification(&applicant_id, &types))
            .await?;

        let attached = self
            .repos
            .kyc
            .attach_verification(
                KycUpdate {
                    kyc_id: record.id,
                    from: KycStatus::Pending,
                    to: KycStatus::UnderReview,
                    notes: vec![format!("Verification {} opened", verification_id)],
                },
                &applicant_id,
                &verification_id,
            )
            .await?;
        if !attached {
            tracing::error!(
                kyc_id = %record.id,
                applicant_id = %applicant_id,
                verification_id = %verification_id,
                "Verification opened but KYC record changed concurrently"
            );
            return Err(AppError::Conflict(format!(
                "KYC record {} was updated concurrently",
                record.id
            )));
        }

        tracing::info!(kyc_id = %record.id, verification_id = %verification_id, "KYC verification started");
        Ok(self.repos.kyc.get_by_id(record.id).await?)
    }

    /// Applies the provider's verification result through the review flow.
    pub async fn sync_verification(&self, kyc_id: Uuid) -> Result<KycRecord, AppError> {
        let record = self.reviewable(kyc_id).await?;
        let verification_id = record.verification_id.clone().ok_or_else(|| {
            AppError::InvalidStateTransition(format!(
                "KYC record {} has no provider verification",
                record.id
            ))
        })?;

        let kyc = &self.providers.kyc;
        let report = self
            .bounded(kyc.name(), kyc.get_verification(&verification_id))
            .await?;
        let target = report.kyc_status();

        tracing::info!(
            kyc_id = %record.id,
            verification_id = %verification_id,
            provider_status = %report.status,
            status = %target,
            "KYC verification synced"
        );

        if target == record.status {
            return Ok(record);
        }
        let notes = match target {
            KycStatus::Rejected => vec![format!("Declined by provider (verification {})", verification_id)],
            _ => Vec::new(),
        };
        self.transition(&record, target, notes).await
    }

    async fn reviewable(&self, kyc_id: Uuid) -> Result<KycRecord, AppError> {
        let record = self.repos.kyc.get_by_id(kyc_id).await?;
        if !record.status.is_reviewable() {
            return Err(AppError::InvalidStateTransition(format!(
                "KYC record {} is already approved",
                record.id
            )));
        }
        Ok(record)
    }

    async fn transition(
        &self,
        record: &KycRecord,
        to: KycStatus,
        notes: Vec<String>,
    ) -> Result<KycRecord, AppError> {
        let updated = self
            .repos
            .kyc
            .update_status(KycUpdate {
                kyc_id: record.id,
                from: record.status,
                to,
                notes,
            })
            .await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "KYC record {} was updated concurrently",
                record.id
            )));
        }

        tracing::info!(kyc_id = %record.id, from = %record.status, to = %to, "KYC status updated");
        Ok(self.repos.kyc.get_by_id(record.id).await?)
    }

    async fn bounded<T, F>(&self, provider: &'static str, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        providers::with_timeout(provider, self.provider_timeout, call).await
    }
}
