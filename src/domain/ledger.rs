//! Ledger entry domain entity.
//! Entries are immutable once written: nothing updates or deletes them.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    pub enum Direction as "ledger direction" {
        Debit => "debit",
        Credit => "credit",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account: String,
    #[schema(value_type = String)]
    pub debit: BigDecimal,
    #[schema(value_type = String)]
    pub credit: BigDecimal,
    pub currency: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Side of the entry; exactly one of debit/credit is non-zero.
    pub fn direction(&self) -> Direction {
        if self.debit.is_zero() {
            Direction::Credit
        } else {
            Direction::Debit
        }
    }

    pub fn amount(&self) -> &BigDecimal {
        match self.direction() {
            Direction::Debit => &self.debit,
            Direction::Credit => &self.credit,
        }
    }
}

/// Client balance account: `wallet:{userId}:{currency}`.
pub fn wallet_account(user_id: Uuid, currency: &str) -> String {
    format!("wallet:{}:{}", user_id, currency)
}

/// Outbound rail account: `payout:{country}`.
pub fn payout_account(country: &str) -> String {
    format!("payout:{}", country)
}
