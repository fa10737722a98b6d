//! Transaction domain entity.
//! A single leg of a cross-border transfer: a deposit, a swap or a payout.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    /// Kind of money movement. Never changes after creation.
    pub enum TransactionType as "transaction type" {
        Deposit => "deposit",
        Swap => "swap",
        Payout => "payout",
    }
}

text_enum! {
    pub enum TransactionStatus as "transaction status" {
        PendingDeposit => "pending_deposit",
        DepositReceived => "deposit_received",
        SwapPending => "swap_pending",
        SwapProcessing => "swap_processing",
        SwapCompleted => "swap_completed",
        PayoutPending => "payout_pending",
        PayoutSent => "payout_sent",
        PayoutCompleted => "payout_completed",
        PayoutFailed => "payout_failed",
    }
}

text_enum! {
    /// Operator action requested through the admin console.
    pub enum AdminAction as "action" {
        MarkReceived => "mark_received",
        ExecuteSwap => "execute_swap",
        SendPayout => "send_payout",
    }
}

impl TransactionType {
    /// Every status a transaction of this type may hold.
    pub fn statuses(&self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            TransactionType::Deposit => &[PendingDeposit, DepositReceived],
            TransactionType::Swap => &[SwapPending, SwapProcessing, SwapCompleted],
            TransactionType::Payout => &[PayoutPending, PayoutSent, PayoutCompleted, PayoutFailed],
        }
    }

    pub fn initial_status(&self) -> TransactionStatus {
        match self {
            TransactionType::Deposit => TransactionStatus::PendingDeposit,
            TransactionType::Swap => TransactionStatus::SwapPending,
            TransactionType::Payout => TransactionStatus::PayoutPending,
        }
    }
}

impl TransactionStatus {
    pub fn is_legal_for(&self, transaction_type: TransactionType) -> bool {
        transaction_type.statuses().contains(self)
    }
}

impl AdminAction {
    /// The only transaction type this action applies to.
    pub fn required_type(&self) -> TransactionType {
        match self {
            AdminAction::MarkReceived => TransactionType::Deposit,
            AdminAction::ExecuteSwap => TransactionType::Swap,
            AdminAction::SendPayout => TransactionType::Payout,
        }
    }

    /// Status the transaction must hold for the action to run.
    pub fn precondition(&self) -> TransactionStatus {
        self.required_type().initial_status()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reference_number: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    /// Destination currency of a swap.
    pub target_currency: Option<String>,
    /// Swap provider conversion, set once the provider accepts it.
    pub conversion_id: Option<String>,
    /// Destination amount quoted for `conversion_id`.
    #[schema(value_type = Option<String>)]
    pub converted_amount: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        reference_number: String,
        transaction_type: TransactionType,
        amount: BigDecimal,
        currency: String,
        target_currency: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            reference_number,
            transaction_type,
            status: transaction_type.initial_status(),
            amount,
            currency,
            target_currency,
            conversion_id: None,
            converted_amount: None,
            created_at: now,
            updated_at: now,
        }
    }
}
