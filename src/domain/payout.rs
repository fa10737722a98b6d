//! Payout request domain entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    /// Moves forward only: pending -> processing -> sent -> completed, or -> failed.
    pub enum PayoutStatus as "payout status" {
        Pending => "pending",
        Processing => "processing",
        Sent => "sent",
        Completed => "completed",
        Failed => "failed",
    }
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Completed | PayoutStatus::Failed)
    }
}

/// Bank details of the person receiving the funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    pub account: String,
    pub bank_name: String,
    pub bank_code: Option<String>,
    /// ISO 3166 alpha-2 country code.
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub recipient: Recipient,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PayoutStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub provider_request_id: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(transaction_id: Uuid, recipient: Recipient, amount: BigDecimal, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            recipient,
            amount,
            currency,
            status: PayoutStatus::Pending,
            sent_at: None,
            completed_at: None,
            provider_request_id: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}
