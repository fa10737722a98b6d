//! Transaction state machine.
//!
//! Validates an admin action against the transaction's `(type, status)`, runs
//! the provider side effect and commits the new status together with its
//! ledger entries.
//!
//! Concurrency is optimistic. Actions with an external call first claim the
//! record by moving it to an in-flight status with a conditional update; only
//! the caller that wins the claim talks to the provider. A failed provider
//! call releases the claim. A swap the provider accepts but has not settled
//! keeps its claim with the conversion id recorded until `refresh_swap` sees a
//! final result. A successful call is committed in a single storage
//! transaction guarded on the in-flight status. If that commit fails the claim
//! stays in place so nothing can re-send, and the failure is logged for
//! manual reconciliation.

use std::future::Future;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::ledger::{payout_account, wallet_account};
use crate::domain::{
    AdminAction, Direction, LedgerEntry, PayoutStatus, Transaction, TransactionStatus,
    TransactionType,
};
use crate::error::AppError;
use crate::ports::{PayoutDispatch, PayoutSettlement, Repositories, RepositoryError, StatusCommit};
use crate::providers::{
    self, ConversionStatus, PayoutOrder, ProviderError, ProviderPayoutState, Providers,
    SwapConversion,
};
use crate::services::ledger::{LedgerError, LedgerWriter};
use crate::validation;

/// Result of a successful [`TransactionStateMachine::apply_action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub transaction_id: Uuid,
    pub new_status: TransactionStatus,
    /// Set for `send_payout`.
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutDispatched {
    pub payout_id: Uuid,
    pub transaction_id: Uuid,
    pub provider_request_id: String,
    pub tracking_number: String,
    pub new_status: TransactionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRefreshed {
    pub payout_id: Uuid,
    pub status: PayoutStatus,
    /// `false` when the provider still reports the payout as in progress.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRefreshed {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    /// `false` when the provider still reports the conversion as pending.
    pub changed: bool,
}

#[derive(Clone)]
pub struct TransactionStateMachine {
    repos: Repositories,
    providers: Providers,
    provider_timeout: Duration,
}

impl TransactionStateMachine {
    pub fn new(repos: Repositories, providers: Providers, provider_timeout: Duration) -> Self {
        Self {
            repos,
            providers,
            provider_timeout,
        }
    }

    pub async fn apply_action(
        &self,
        transaction_id: Uuid,
        action: AdminAction,
    ) -> Result<ActionOutcome, AppError> {
        let tx = self.repos.transactions.get_by_id(transaction_id).await?;

        if tx.transaction_type != action.required_type() {
            tracing::warn!(
                transaction_id = %tx.id,
                action = %action,
                transaction_type = %tx.transaction_type,
                "Action rejected for transaction type"
            );
            return Err(AppError::InvalidStateTransition(format!(
                "Action {} is not valid for {} transaction {}",
                action, tx.transaction_type, tx.id
            )));
        }
        if tx.status != action.precondition() {
            return Err(already_processed(&tx, action.precondition()));
        }

        tracing::info!(transaction_id = %tx.id, action = %action, "Applying admin action");

        match action {
            AdminAction::MarkReceived => self.mark_received(&tx).await,
            AdminAction::ExecuteSwap => self.execute_swap(&tx).await,
            AdminAction::SendPayout => {
                let payout = self
                    .repos
                    .payouts
                    .find_by_transaction(tx.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Payout request for transaction {}", tx.id))
                    })?;
                let dispatched = self.send_payout(payout.id).await?;
                Ok(ActionOutcome {
                    transaction_id: tx.id,
                    new_status: dispatched.new_status,
                    tracking_number: Some(dispatched.tracking_number),
                })
            }
        }
    }

    async fn mark_received(&self, tx: &Transaction) -> Result<ActionOutcome, AppError> {
        let mut ledger = LedgerWriter::new(tx.id);
        ledger.record(
            wallet_account(tx.user_id, &tx.currency),
            &tx.amount,
            Direction::Credit,
            &tx.currency,
            format!("Deposit received {}", tx.reference_number),
        )?;

        let committed = self
            .repos
            .transactions
            .commit(StatusCommit {
                transaction_id: tx.id,
                from: TransactionStatus::PendingDeposit,
                to: TransactionStatus::DepositReceived,
                entries: ledger.finish(),
            })
            .await?;

        if !committed {
            return Err(AppError::Conflict(format!(
                "Transaction {} was updated concurrently",
                tx.id
            )));
        }

        tracing::info!(transaction_id = %tx.id, amount = %tx.amount, currency = %tx.currency, "Deposit marked received");
        Ok(ActionOutcome {
            transaction_id: tx.id,
            new_status: TransactionStatus::DepositReceived,
            tracking_number: None,
        })
    }

    async fn execute_swap(&self, tx: &Transaction) -> Result<ActionOutcome, AppError> {
        let to_currency = tx.target_currency.clone().ok_or_else(|| {
            AppError::Validation(format!("Swap transaction {} has no target currency", tx.id))
        })?;

        if !self
            .repos
            .transactions
            .compare_and_set_status(tx.id, TransactionStatus::SwapPending, TransactionStatus::SwapProcessing)
            .await?
        {
            return Err(already_processed(tx, TransactionStatus::SwapPending));
        }

        let swap = &self.providers.swap;
        let quote = match self
            .bounded(swap.name(), swap.quote(&tx.currency, &to_currency, &tx.amount))
            .await
            .and_then(|quote| {
                if quote.is_expired_at(Utc::now()) {
                    Err(ProviderError::quote_expired(swap.name(), &quote.quote_id))
                } else {
                    Ok(quote)
                }
            }) {
            Ok(quote) => quote,
            Err(e) => {
                self.release_transaction(tx.id, TransactionStatus::SwapProcessing, TransactionStatus::SwapPending)
                    .await;
                return Err(e.into());
            }
        };

        // Entries are validated before the conversion is executed.
        let reference = format!("quote {}", quote.quote_id);
        let entries = match swap_entries(tx, &to_currency, &quote.to_amount, &reference) {
            Ok(entries) => entries,
            Err(e) => {
                self.release_transaction(tx.id, TransactionStatus::SwapProcessing, TransactionStatus::SwapPending)
                    .await;
                return Err(e.into());
            }
        };

        let conversion = match self
            .bounded(swap.name(), swap.execute(&quote.quote_id))
            .await
            .and_then(|conversion| settled_or_pending(swap.name(), conversion))
        {
            Ok(conversion) => conversion,
            Err(e) => {
                self.release_transaction(tx.id, TransactionStatus::SwapProcessing, TransactionStatus::SwapPending)
                    .await;
                return Err(e.into());
            }
        };

        if conversion.status == ConversionStatus::Pending {
            return self.hold_conversion(tx, &conversion, &quote.to_amount).await;
        }

        let commit = StatusCommit {
            transaction_id: tx.id,
            from: TransactionStatus::SwapProcessing,
            to: TransactionStatus::SwapCompleted,
            entries,
        };
        match self.repos.transactions.commit(commit).await {
            Ok(true) => {
                tracing::info!(
                    transaction_id = %tx.id,
                    quote_id = %quote.quote_id,
                    conversion_id = %conversion.conversion_id,
                    rate = %quote.rate,
                    to_amount = %quote.to_amount,
                    "Swap completed"
                );
                Ok(ActionOutcome {
                    transaction_id: tx.id,
                    new_status: TransactionStatus::SwapCompleted,
                    tracking_number: None,
                })
            }
            outcome => Err(unrecorded_swap(tx.id, &conversion.conversion_id, outcome)),
        }
    }

    /// Keeps the claim at `swap_processing` and remembers the conversion so
    /// [`Self::refresh_swap`] can settle it later. Nothing is booked yet.
    async fn hold_conversion(
        &self,
        tx: &Transaction,
        conversion: &SwapConversion,
        converted_amount: &BigDecimal,
    ) -> Result<ActionOutcome, AppError> {
        let recorded = self
            .repos
            .transactions
            .record_conversion(tx.id, &conversion.conversion_id, converted_amount)
            .await;
        match recorded {
            Ok(true) => {
                tracing::info!(
                    transaction_id = %tx.id,
                    conversion_id = %conversion.conversion_id,
                    "Swap conversion pending at provider"
                );
                Ok(ActionOutcome {
                    transaction_id: tx.id,
                    new_status: TransactionStatus::SwapProcessing,
                    tracking_number: None,
                })
            }
            outcome => Err(unrecorded_swap(tx.id, &conversion.conversion_id, outcome)),
        }
    }

    /// Polls the swap provider for a pending conversion. A completed
    /// conversion books both legs and moves the swap to `swap_completed`; a
    /// failed one returns it to `swap_pending` without touching the ledger.
    pub async fn refresh_swap(&self, transaction_id: Uuid) -> Result<SwapRefreshed, AppError> {
        let tx = self.repos.transactions.get_by_id(transaction_id).await?;
        if tx.transaction_type != TransactionType::Swap {
            return Err(AppError::InvalidStateTransition(format!(
                "Transaction {} is a {}, only swaps can be refreshed",
                tx.id, tx.transaction_type
            )));
        }
        let (conversion_id, converted_amount) = match (&tx.conversion_id, &tx.converted_amount) {
            (Some(id), Some(amount)) if tx.status == TransactionStatus::SwapProcessing => {
                (id.clone(), amount.clone())
            }
            _ => {
                return Err(AppError::InvalidStateTransition(format!(
                    "Transaction {} has no pending conversion (status {})",
                    tx.id, tx.status
                )))
            }
        };
        let to_currency = tx.target_currency.clone().ok_or_else(|| {
            AppError::Validation(format!("Swap transaction {} has no target currency", tx.id))
        })?;

        let swap = &self.providers.swap;
        let conversion = self
            .bounded(swap.name(), swap.conversion_status(&conversion_id))
            .await?;

        match conversion.status {
            ConversionStatus::Pending => {
                tracing::debug!(transaction_id = %tx.id, conversion_id = %conversion_id, "Conversion still pending");
                Ok(SwapRefreshed {
                    transaction_id: tx.id,
                    status: TransactionStatus::SwapProcessing,
                    changed: false,
                })
            }
            ConversionStatus::Completed => {
                let entries = swap_entries(
                    &tx,
                    &to_currency,
                    &converted_amount,
                    &format!("conversion {}", conversion_id),
                )?;
                let committed = self
                    .repos
                    .transactions
                    .commit(StatusCommit {
                        transaction_id: tx.id,
                        from: TransactionStatus::SwapProcessing,
                        to: TransactionStatus::SwapCompleted,
                        entries,
                    })
                    .await?;
                if !committed {
                    return Err(AppError::Conflict(format!(
                        "Transaction {} was updated concurrently",
                        tx.id
                    )));
                }
                tracing::info!(
                    transaction_id = %tx.id,
                    conversion_id = %conversion_id,
                    to_amount = %converted_amount,
                    "Swap completed"
                );
                Ok(SwapRefreshed {
                    transaction_id: tx.id,
                    status: TransactionStatus::SwapCompleted,
                    changed: true,
                })
            }
            ConversionStatus::Failed | ConversionStatus::Cancelled => {
                if !self
                    .repos
                    .transactions
                    .abandon_conversion(tx.id, &conversion_id)
                    .await?
                {
                    return Err(AppError::Conflict(format!(
                        "Transaction {} was updated concurrently",
                        tx.id
                    )));
                }
                tracing::warn!(
                    transaction_id = %tx.id,
                    conversion_id = %conversion_id,
                    status = ?conversion.status,
                    "Conversion did not complete, swap returned to pending"
                );
                Ok(SwapRefreshed {
                    transaction_id: tx.id,
                    status: TransactionStatus::SwapPending,
                    changed: true,
                })
            }
        }
    }

    /// Sends a pending payout through the payout provider. The payout id is
    /// the idempotency reference handed to the provider.
    pub async fn send_payout(&self, payout_id: Uuid) -> Result<PayoutDispatched, AppError> {
        let payout = self.repos.payouts.get_by_id(payout_id).await?;
        if payout.status != PayoutStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "Payout {} already processed (status {})",
                payout.id, payout.status
            )));
        }
        validation::validate_recipient(&payout.recipient, &payout.currency)?;

        let tx = self.repos.transactions.get_by_id(payout.transaction_id).await?;
        if tx.transaction_type != TransactionType::Payout {
            return Err(AppError::InvalidStateTransition(format!(
                "Payout {} is linked to {} transaction {}",
                payout.id, tx.transaction_type, tx.id
            )));
        }
        if tx.status != TransactionStatus::PayoutPending {
            return Err(already_processed(&tx, TransactionStatus::PayoutPending));
        }

        let mut ledger = LedgerWriter::new(tx.id);
        ledger.record(
            payout_account(&payout.recipient.country),
            &payout.amount,
            Direction::Debit,
            &payout.currency,
            format!("Payout to {} ({})", payout.recipient.name, payout.recipient.bank_name),
        )?;
        let entries = ledger.finish();

        if !self
            .repos
            .payouts
            .compare_and_set_status(payout.id, PayoutStatus::Pending, PayoutStatus::Processing)
            .await?
        {
            tracing::warn!(payout_id = %payout.id, "Payout claimed by a concurrent request");
            return Err(AppError::InvalidStateTransition(format!(
                "Payout {} already processed",
                payout.id
            )));
        }

        let provider = &self.providers.payout;
        let order = PayoutOrder {
            reference: payout.id.to_string(),
            amount: payout.amount.clone(),
            currency: payout.currency.clone(),
            recipient: payout.recipient.clone(),
        };
        let receipt = match self.bounded(provider.name(), provider.send(&order)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.release_payout(payout.id, PayoutStatus::Processing, PayoutStatus::Pending)
                    .await;
                return Err(e.into());
            }
        };

        let dispatch = PayoutDispatch {
            payout_id: payout.id,
            provider_request_id: receipt.provider_request_id.clone(),
            tracking_number: receipt.tracking_number.clone(),
            sent_at: Utc::now(),
            transaction: StatusCommit {
                transaction_id: tx.id,
                from: TransactionStatus::PayoutPending,
                to: TransactionStatus::PayoutSent,
                entries,
            },
        };

        match self.repos.payouts.commit_dispatch(dispatch).await {
            Ok(true) => {
                tracing::info!(
                    payout_id = %payout.id,
                    transaction_id = %tx.id,
                    provider_request_id = %receipt.provider_request_id,
                    tracking_number = %receipt.tracking_number,
                    "Payout sent"
                );
                Ok(PayoutDispatched {
                    payout_id: payout.id,
                    transaction_id: tx.id,
                    provider_request_id: receipt.provider_request_id,
                    tracking_number: receipt.tracking_number,
                    new_status: TransactionStatus::PayoutSent,
                })
            }
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    _ => "status guard failed".to_string(),
                };
                tracing::error!(
                    payout_id = %payout.id,
                    transaction_id = %tx.id,
                    action = %AdminAction::SendPayout,
                    provider_request_id = %receipt.provider_request_id,
                    tracking_number = %receipt.tracking_number,
                    reason = %reason,
                    "Payout sent at provider but not recorded; manual reconciliation required"
                );
                Err(AppError::Internal(format!(
                    "Payout {} was sent (tracking {}) but could not be recorded",
                    payout.id, receipt.tracking_number
                )))
            }
        }
    }

    /// Pulls the provider's view of a sent payout and settles it when final.
    pub async fn refresh_payout(&self, payout_id: Uuid) -> Result<PayoutRefreshed, AppError> {
        let payout = self.repos.payouts.get_by_id(payout_id).await?;
        if payout.status != PayoutStatus::Sent {
            return Err(AppError::InvalidStateTransition(format!(
                "Payout {} is {}, only sent payouts can be refreshed",
                payout.id, payout.status
            )));
        }
        let provider_request_id = payout.provider_request_id.clone().ok_or_else(|| {
            AppError::Internal(format!("Sent payout {} has no provider request id", payout.id))
        })?;

        let provider = &self.providers.payout;
        let report = self
            .bounded(provider.name(), provider.status(&provider_request_id))
            .await?;

        let (outcome, transaction_status) = match report.state {
            ProviderPayoutState::Completed => {
                (PayoutStatus::Completed, TransactionStatus::PayoutCompleted)
            }
            ProviderPayoutState::Failed | ProviderPayoutState::Cancelled => {
                (PayoutStatus::Failed, TransactionStatus::PayoutFailed)
            }
            ProviderPayoutState::Pending | ProviderPayoutState::InProgress => {
                tracing::debug!(payout_id = %payout.id, state = ?report.state, "Payout still in progress");
                return Ok(PayoutRefreshed {
                    payout_id: payout.id,
                    status: PayoutStatus::Sent,
                    changed: false,
                });
            }
        };

        let mut ledger = LedgerWriter::new(payout.transaction_id);
        if outcome == PayoutStatus::Failed {
            ledger.record(
                payout_account(&payout.recipient.country),
                &payout.amount,
                Direction::Credit,
                &payout.currency,
                format!(
                    "Payout reversal: {}",
                    report.error_message.as_deref().unwrap_or("rejected by provider")
                ),
            )?;
        }

        let settled = self
            .repos
            .payouts
            .commit_settlement(PayoutSettlement {
                payout_id: payout.id,
                outcome,
                settled_at: Utc::now(),
                transaction: StatusCommit {
                    transaction_id: payout.transaction_id,
                    from: TransactionStatus::PayoutSent,
                    to: transaction_status,
                    entries: ledger.finish(),
                },
            })
            .await?;
        if !settled {
            return Err(AppError::Conflict(format!(
                "Payout {} was settled concurrently",
                payout.id
            )));
        }

        tracing::info!(
            payout_id = %payout.id,
            transaction_id = %payout.transaction_id,
            outcome = %outcome,
            "Payout settled"
        );
        Ok(PayoutRefreshed {
            payout_id: payout.id,
            status: outcome,
            changed: true,
        })
    }

    async fn bounded<T, F>(&self, provider: &'static str, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        providers::with_timeout(provider, self.provider_timeout, call).await
    }

    async fn release_transaction(&self, id: Uuid, from: TransactionStatus, to: TransactionStatus) {
        match self.repos.transactions.compare_and_set_status(id, from, to).await {
            Ok(true) => tracing::info!(transaction_id = %id, status = %to, "Claim released"),
            Ok(false) => tracing::warn!(transaction_id = %id, expected = %from, "Claim already released"),
            Err(e) => tracing::error!(transaction_id = %id, error = %e, "Failed to release claim"),
        }
    }

    async fn release_payout(&self, id: Uuid, from: PayoutStatus, to: PayoutStatus) {
        match self.repos.payouts.compare_and_set_status(id, from, to).await {
            Ok(true) => tracing::info!(payout_id = %id, status = %to, "Claim released"),
            Ok(false) => tracing::warn!(payout_id = %id, expected = %from, "Claim already released"),
            Err(e) => tracing::error!(payout_id = %id, error = %e, "Failed to release claim"),
        }
    }
}

/// Debit of the source currency, credit of the quoted destination amount.
fn swap_entries(
    tx: &Transaction,
    to_currency: &str,
    to_amount: &BigDecimal,
    reference: &str,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let description = format!("Swap {} -> {} ({})", tx.currency, to_currency, reference);
    let mut ledger = LedgerWriter::new(tx.id);
    ledger.record(
        wallet_account(tx.user_id, &tx.currency),
        &tx.amount,
        Direction::Debit,
        &tx.currency,
        description.clone(),
    )?;
    ledger.record(
        wallet_account(tx.user_id, to_currency),
        to_amount,
        Direction::Credit,
        to_currency,
        description,
    )?;
    Ok(ledger.finish())
}

/// A conversion the provider reports as failed at execution time is a
/// provider error like any other.
fn settled_or_pending(provider: &'static str, conversion: SwapConversion) -> Result<SwapConversion, ProviderError> {
    match conversion.status {
        ConversionStatus::Completed | ConversionStatus::Pending => Ok(conversion),
        ConversionStatus::Failed | ConversionStatus::Cancelled => Err(ProviderError::new(
            provider,
            "conversion_failed",
            format!("conversion {} ended {:?}", conversion.conversion_id, conversion.status),
        )),
    }
}

fn unrecorded_swap(
    transaction_id: Uuid,
    conversion_id: &str,
    outcome: Result<bool, RepositoryError>,
) -> AppError {
    let reason = match outcome {
        Err(e) => e.to_string(),
        _ => "status guard failed".to_string(),
    };
    tracing::error!(
        transaction_id = %transaction_id,
        action = %AdminAction::ExecuteSwap,
        conversion_id = %conversion_id,
        reason = %reason,
        "Swap executed at provider but not recorded; manual reconciliation required"
    );
    AppError::Internal(format!(
        "Swap for transaction {} executed (conversion {}) but could not be recorded",
        transaction_id, conversion_id
    ))
}

fn already_processed(tx: &Transaction, expected: TransactionStatus) -> AppError {
    AppError::InvalidStateTransition(format!(
        "Transaction {} already processed (status {}, expected {})",
        tx.id, tx.status, expected
    ))
}
