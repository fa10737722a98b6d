//! Ledger writer.
//! Builds the immutable entries a state transition produces. Entries are
//! persisted only together with the status change that caused them.

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Direction, LedgerEntry};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger amount must be positive, got {0}")]
    NonPositiveAmount(String),

    #[error("ledger {0} must not be empty")]
    MissingField(&'static str),
}

/// Accumulates the entries of one transition for one transaction.
#[derive(Debug)]
pub struct LedgerWriter {
    transaction_id: Uuid,
    entries: Vec<LedgerEntry>,
}

impl LedgerWriter {
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            entries: Vec::new(),
        }
    }

    /// Appends a single-sided entry: `amount` lands on the `direction` side,
    /// the other side is zero.
    pub fn record(
        &mut self,
        account: impl Into<String>,
        amount: &BigDecimal,
        direction: Direction,
        currency: &str,
        description: impl Into<String>,
    ) -> Result<&LedgerEntry, LedgerError> {
        let account = account.into();
        if account.trim().is_empty() {
            return Err(LedgerError::MissingField("account"));
        }
        if currency.trim().is_empty() {
            return Err(LedgerError::MissingField("currency"));
        }
        if amount <= &BigDecimal::zero() {
            return Err(LedgerError::NonPositiveAmount(amount.to_string()));
        }

        let (debit, credit) = match direction {
            Direction::Debit => (amount.clone(), BigDecimal::zero()),
            Direction::Credit => (BigDecimal::zero(), amount.clone()),
        };

        self.entries.push(LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id: self.transaction_id,
            account,
            debit,
            credit,
            currency: currency.to_string(),
            description: description.into(),
            created_at: Utc::now(),
        });

        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// Entries to hand to the storage commit, in recording order.
    pub fn finish(self) -> Vec<LedgerEntry> {
        self.entries
    }
}
