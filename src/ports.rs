//! Storage ports.
//! Each trait is owned by the component that mutates the entity; adapters in
//! `crate::adapters` implement all of them.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    AdminProfile, CustodyWallet, KycRecord, KycStatus, LedgerEntry, PayoutRequest, PayoutStatus,
    Transaction, TransactionStatus,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Already exists: {0}")]
    Duplicate(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Conditional transaction status change together with the ledger entries it
/// produces. Applied as one unit: if the transaction is no longer at `from`
/// nothing is written.
#[derive(Debug, Clone)]
pub struct StatusCommit {
    pub transaction_id: Uuid,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub entries: Vec<LedgerEntry>,
}

/// Result of a successful payout provider call, committed with the
/// transaction status change and its ledger entry.
#[derive(Debug, Clone)]
pub struct PayoutDispatch {
    pub payout_id: Uuid,
    pub provider_request_id: String,
    pub tracking_number: String,
    pub sent_at: DateTime<Utc>,
    pub transaction: StatusCommit,
}

/// Final outcome of a sent payout (`completed` or `failed`).
#[derive(Debug, Clone)]
pub struct PayoutSettlement {
    pub payout_id: Uuid,
    pub outcome: PayoutStatus,
    pub settled_at: DateTime<Utc>,
    pub transaction: StatusCommit,
}

/// Conditional KYC status change. `notes` are appended to the history.
#[derive(Debug, Clone)]
pub struct KycUpdate {
    pub kyc_id: Uuid,
    pub from: KycStatus,
    pub to: KycStatus,
    pub notes: Vec<String>,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Transaction>>;

    /// Returns `false` when the current status was not `from`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<bool>;

    /// Returns `false` (and writes nothing) when the guard in `commit` fails.
    async fn commit(&self, commit: StatusCommit) -> RepositoryResult<bool>;

    /// Stores a conversion the swap provider accepted but has not settled.
    /// Guarded on `swap_processing` with no conversion recorded yet.
    async fn record_conversion(
        &self,
        id: Uuid,
        conversion_id: &str,
        converted_amount: &BigDecimal,
    ) -> RepositoryResult<bool>;

    /// Clears `conversion_id` and moves the swap back to `swap_pending`.
    async fn abandon_conversion(&self, id: Uuid, conversion_id: &str) -> RepositoryResult<bool>;

    async fn count_by_status(&self) -> RepositoryResult<Vec<(TransactionStatus, i64)>>;
}

#[async_trait]
pub trait PayoutRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<PayoutRequest>;

    async fn find_by_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Option<PayoutRequest>>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PayoutRequest>>;

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> RepositoryResult<bool>;

    /// Moves the payout `processing -> sent` and applies the transaction commit,
    /// all or nothing.
    async fn commit_dispatch(&self, dispatch: PayoutDispatch) -> RepositoryResult<bool>;

    /// Moves the payout `sent -> outcome` and applies the transaction commit,
    /// all or nothing.
    async fn commit_settlement(&self, settlement: PayoutSettlement) -> RepositoryResult<bool>;
}

/// Read side of the ledger. Entries are only ever written through
/// [`TransactionRepository::commit`] and the payout commits.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Oldest first.
    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait KycRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<KycRecord>;

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<KycRecord>>;

    /// Newest first, documents included.
    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<KycRecord>>;

    async fn update_status(&self, update: KycUpdate) -> RepositoryResult<bool>;

    /// Stores provider ids and moves the status, guarded by `update.from`.
    async fn attach_verification(
        &self,
        update: KycUpdate,
        applicant_id: &str,
        verification_id: &str,
    ) -> RepositoryResult<bool>;

    async fn count_by_status(&self) -> RepositoryResult<Vec<(KycStatus, i64)>>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_admin(&self, user_id: Uuid) -> RepositoryResult<Option<AdminProfile>>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn count_clients(&self) -> RepositoryResult<i64>;

    async fn find_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<CustodyWallet>>;

    /// At most one wallet per client; a second insert is a `Duplicate`.
    async fn insert_wallet(&self, wallet: &CustodyWallet) -> RepositoryResult<()>;
}

/// Every port, injected into services and handlers.
#[derive(Clone)]
pub struct Repositories {
    pub transactions: Arc<dyn TransactionRepository>,
    pub payouts: Arc<dyn PayoutRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub kyc: Arc<dyn KycRepository>,
    pub admins: Arc<dyn AdminRepository>,
    pub clients: Arc<dyn ClientRepository>,
}

impl Repositories {
    /// Wires every port to a single store implementing all of them.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: TransactionRepository
            + PayoutRepository
            + LedgerRepository
            + KycRepository
            + AdminRepository
            + ClientRepository
            + 'static,
    {
        Self {
            transactions: store.clone(),
            payouts: store.clone(),
            ledger: store.clone(),
            kyc: store.clone(),
            admins: store.clone(),
            clients: store,
        }
    }
}
