//! Aggregate counts and recent activity for the admin dashboard.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{KycRecord, KycStatus, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::Repositories;

const RECENT_KYC_LIMIT: i64 = 5;
const RECENT_TRANSACTIONS_LIMIT: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_clients: i64,
    #[serde(rename = "pendingKYC")]
    pub pending_kyc: i64,
    #[serde(rename = "underReviewKYC")]
    pub under_review_kyc: i64,
    #[serde(rename = "approvedKYC")]
    pub approved_kyc: i64,
    #[serde(rename = "rejectedKYC")]
    pub rejected_kyc: i64,
    pub pending_transactions: i64,
    pub completed_transactions: i64,
    pub failed_transactions: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub stats: DashboardCounts,
    #[serde(rename = "recentKYC")]
    pub recent_kyc: Vec<KycRecord>,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Clone)]
pub struct DashboardService {
    repos: Repositories,
}

impl DashboardService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        let mut counts = DashboardCounts {
            total_clients: self.repos.clients.count_clients().await?,
            ..Default::default()
        };

        for (status, n) in self.repos.kyc.count_by_status().await? {
            match status {
                KycStatus::Pending => counts.pending_kyc += n,
                KycStatus::UnderReview => counts.under_review_kyc += n,
                KycStatus::Approved => counts.approved_kyc += n,
                KycStatus::Rejected => counts.rejected_kyc += n,
            }
        }

        for (status, n) in self.repos.transactions.count_by_status().await? {
            match status {
                TransactionStatus::DepositReceived
                | TransactionStatus::SwapCompleted
                | TransactionStatus::PayoutCompleted => counts.completed_transactions += n,
                TransactionStatus::PayoutFailed => counts.failed_transactions += n,
                _ => counts.pending_transactions += n,
            }
        }

        Ok(DashboardStats {
            stats: counts,
            recent_kyc: self.repos.kyc.list(RECENT_KYC_LIMIT, 0).await?,
            recent_transactions: self.repos.transactions.list(RECENT_TRANSACTIONS_LIMIT, 0).await?,
        })
    }
}
