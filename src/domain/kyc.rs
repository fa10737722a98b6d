//! KYC record domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    pub enum KycStatus as "KYC status" {
        Pending => "pending",
        UnderReview => "under_review",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl KycStatus {
    /// Whether a reviewer may still approve or reject the record.
    pub fn is_reviewable(&self) -> bool {
        !matches!(self, KycStatus::Approved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KycDocument {
    pub id: Uuid,
    pub kyc_id: Uuid,
    #[serde(rename = "type")]
    pub document_type: String,
    pub file_reference: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KycRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: KycStatus,
    /// Reviewer comments, oldest first. Append-only.
    pub notes: Vec<String>,
    pub documents: Vec<KycDocument>,
    pub applicant_id: Option<String>,
    pub verification_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycRecord {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: KycStatus::Pending,
            notes: Vec::new(),
            documents: Vec::new(),
            applicant_id: None,
            verification_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
