//! Process-local implementation of every storage port.
//! Used by the test suites and for running the service without PostgreSQL.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    AdminProfile, CustodyWallet, KycRecord, KycStatus, LedgerEntry, PayoutRequest, PayoutStatus,
    Transaction, TransactionStatus,
};
use crate::ports::{
    AdminRepository, ClientRepository, KycRepository, KycUpdate, LedgerRepository,
    PayoutDispatch, PayoutRepository, PayoutSettlement, RepositoryError, RepositoryResult,
    StatusCommit, TransactionRepository,
};

#[derive(Default)]
struct State {
    transactions: HashMap<Uuid, Transaction>,
    payouts: HashMap<Uuid, PayoutRequest>,
    ledger: Vec<LedgerEntry>,
    kyc: HashMap<Uuid, KycRecord>,
    admins: HashMap<Uuid, AdminProfile>,
    clients: HashSet<Uuid>,
    wallets: HashMap<Uuid, CustodyWallet>,
}

impl State {
    fn transaction_at(&self, id: Uuid, status: TransactionStatus) -> bool {
        self.transactions
            .get(&id)
            .map(|tx| tx.status == status)
            .unwrap_or(false)
    }

    fn payout_at(&self, id: Uuid, status: PayoutStatus) -> bool {
        self.payouts
            .get(&id)
            .map(|p| p.status == status)
            .unwrap_or(false)
    }

    /// Caller has already checked the guard.
    fn apply(&mut self, commit: StatusCommit) {
        if let Some(tx) = self.transactions.get_mut(&commit.transaction_id) {
            tx.status = commit.to;
            tx.updated_at = Utc::now();
        }
        self.ledger.extend(commit.entries);
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Corrupt("in-memory store lock poisoned".to_string()))
    }

    pub fn insert_transaction(&self, tx: Transaction) -> RepositoryResult<()> {
        self.lock()?.transactions.insert(tx.id, tx);
        Ok(())
    }

    pub fn insert_payout(&self, payout: PayoutRequest) -> RepositoryResult<()> {
        self.lock()?.payouts.insert(payout.id, payout);
        Ok(())
    }

    pub fn insert_kyc(&self, record: KycRecord) -> RepositoryResult<()> {
        self.lock()?.kyc.insert(record.id, record);
        Ok(())
    }

    pub fn insert_admin(&self, admin: AdminProfile) -> RepositoryResult<()> {
        self.lock()?.admins.insert(admin.id, admin);
        Ok(())
    }

    pub fn insert_client(&self, user_id: Uuid) -> RepositoryResult<()> {
        self.lock()?.clients.insert(user_id);
        Ok(())
    }
}

fn page<T>(mut items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(limit);
    items
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.lock()?
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Transaction>> {
        let mut all: Vec<Transaction> = self.lock()?.transactions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(all, limit, offset))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.transactions.get_mut(&id) {
            Some(tx) if tx.status == from => {
                tx.status = to;
                tx.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("transaction {}", id))),
        }
    }

    async fn commit(&self, commit: StatusCommit) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        if !state.transaction_at(commit.transaction_id, commit.from) {
            return Ok(false);
        }
        state.apply(commit);
        Ok(true)
    }

    async fn record_conversion(
        &self,
        id: Uuid,
        conversion_id: &str,
        converted_amount: &BigDecimal,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.transactions.get_mut(&id) {
            Some(tx) if tx.status == TransactionStatus::SwapProcessing && tx.conversion_id.is_none() => {
                tx.conversion_id = Some(conversion_id.to_string());
                tx.converted_amount = Some(converted_amount.clone());
                tx.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("transaction {}", id))),
        }
    }

    async fn abandon_conversion(&self, id: Uuid, conversion_id: &str) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.transactions.get_mut(&id) {
            Some(tx)
                if tx.status == TransactionStatus::SwapProcessing
                    && tx.conversion_id.as_deref() == Some(conversion_id) =>
            {
                tx.status = TransactionStatus::SwapPending;
                tx.conversion_id = None;
                tx.converted_amount = None;
                tx.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("transaction {}", id))),
        }
    }

    async fn count_by_status(&self) -> RepositoryResult<Vec<(TransactionStatus, i64)>> {
        let mut counts: HashMap<TransactionStatus, i64> = HashMap::new();
        for tx in self.lock()?.transactions.values() {
            *counts.entry(tx.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl PayoutRepository for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<PayoutRequest> {
        self.lock()?
            .payouts
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("payout request {}", id)))
    }

    async fn find_by_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Option<PayoutRequest>> {
        Ok(self
            .lock()?
            .payouts
            .values()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PayoutRequest>> {
        let mut all: Vec<PayoutRequest> = self.lock()?.payouts.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(all, limit, offset))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.payouts.get_mut(&id) {
            Some(payout) if payout.status == from => {
                payout.status = to;
                payout.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("payout request {}", id))),
        }
    }

    async fn commit_dispatch(&self, dispatch: PayoutDispatch) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        if !state.payout_at(dispatch.payout_id, PayoutStatus::Processing)
            || !state.transaction_at(dispatch.transaction.transaction_id, dispatch.transaction.from)
        {
            return Ok(false);
        }
        if let Some(payout) = state.payouts.get_mut(&dispatch.payout_id) {
            payout.status = PayoutStatus::Sent;
            payout.sent_at = Some(dispatch.sent_at);
            payout.provider_request_id = Some(dispatch.provider_request_id);
            payout.tracking_number = Some(dispatch.tracking_number);
            payout.updated_at = Utc::now();
        }
        state.apply(dispatch.transaction);
        Ok(true)
    }

    async fn commit_settlement(&self, settlement: PayoutSettlement) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        if !state.payout_at(settlement.payout_id, PayoutStatus::Sent)
            || !state.transaction_at(
                settlement.transaction.transaction_id,
                settlement.transaction.from,
            )
        {
            return Ok(false);
        }
        if let Some(payout) = state.payouts.get_mut(&settlement.payout_id) {
            payout.status = settlement.outcome;
            if settlement.outcome == PayoutStatus::Completed {
                payout.completed_at = Some(settlement.settled_at);
            }
            payout.updated_at = Utc::now();
        }
        state.apply(settlement.transaction);
        Ok(true)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<LedgerEntry>> {
        Ok(self
            .lock()?
            .ledger
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl KycRepository for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<KycRecord> {
        self.lock()?
            .kyc
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("KYC record {}", id)))
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<KycRecord>> {
        Ok(self
            .lock()?
            .kyc
            .values()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<KycRecord>> {
        let mut all: Vec<KycRecord> = self.lock()?.kyc.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(all, limit, offset))
    }

    async fn update_status(&self, update: KycUpdate) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.kyc.get_mut(&update.kyc_id) {
            Some(record) if record.status == update.from => {
                record.status = update.to;
                record.notes.extend(update.notes);
                record.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("KYC record {}", update.kyc_id))),
        }
    }

    async fn attach_verification(
        &self,
        update: KycUpdate,
        applicant_id: &str,
        verification_id: &str,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        match state.kyc.get_mut(&update.kyc_id) {
            Some(record) if record.status == update.from => {
                record.status = update.to;
                record.notes.extend(update.notes);
                record.applicant_id = Some(applicant_id.to_string());
                record.verification_id = Some(verification_id.to_string());
                record.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("KYC record {}", update.kyc_id))),
        }
    }

    async fn count_by_status(&self) -> RepositoryResult<Vec<(KycStatus, i64)>> {
        let mut counts: HashMap<KycStatus, i64> = HashMap::new();
        for record in self.lock()?.kyc.values() {
            *counts.entry(record.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl AdminRepository for InMemoryStore {
    async fn find_admin(&self, user_id: Uuid) -> RepositoryResult<Option<AdminProfile>> {
        Ok(self.lock()?.admins.get(&user_id).cloned())
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn count_clients(&self) -> RepositoryResult<i64> {
        Ok(self.lock()?.clients.len() as i64)
    }

    async fn find_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<CustodyWallet>> {
        Ok(self.lock()?.wallets.get(&user_id).cloned())
    }

    async fn insert_wallet(&self, wallet: &CustodyWallet) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        if state.wallets.contains_key(&wallet.user_id) {
            return Err(RepositoryError::Duplicate(format!(
                "wallet for client {}",
                wallet.user_id
            )));
        }
        state.wallets.insert(wallet.user_id, wallet.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;
    use bigdecimal::BigDecimal;

    fn deposit() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            "REF-100".to_string(),
            TransactionType::Deposit,
            BigDecimal::from(50),
            "USDT".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn test_commit_is_guarded_by_status() {
        let store = InMemoryStore::new();
        let tx = deposit();
        store.insert_transaction(tx.clone()).unwrap();

        let commit = StatusCommit {
            transaction_id: tx.id,
            from: TransactionStatus::PendingDeposit,
            to: TransactionStatus::DepositReceived,
            entries: Vec::new(),
        };
        assert!(store.commit(commit.clone()).await.unwrap());
        assert!(!store.commit(commit).await.unwrap());

        let stored = TransactionRepository::get_by_id(&store, tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::DepositReceived);
    }

    #[tokio::test]
    async fn test_missing_transaction_is_not_found() {
        let store = InMemoryStore::new();
        let result = TransactionRepository::get_by_id(&store, Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = InMemoryStore::new();
        let mut older = deposit();
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = deposit();
        store.insert_transaction(older.clone()).unwrap();
        store.insert_transaction(newer.clone()).unwrap();

        let first = TransactionRepository::list(&store, 1, 0).await.unwrap();
        assert_eq!(first[0].id, newer.id);
        let second = TransactionRepository::list(&store, 1, 1).await.unwrap();
        assert_eq!(second[0].id, older.id);
        assert!(TransactionRepository::list(&store, 1, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_wallet_for_client_is_duplicate() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let wallet = |provider_wallet_id: &str| CustodyWallet {
            id: Uuid::new_v4(),
            user_id,
            provider_wallet_id: provider_wallet_id.to_string(),
            addresses: Vec::new(),
            created_at: Utc::now(),
        };

        store.insert_wallet(&wallet("w1")).await.unwrap();
        let result = store.insert_wallet(&wallet("w2")).await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));

        let stored = store.find_wallet(user_id).await.unwrap().unwrap();
        assert_eq!(stored.provider_wallet_id, "w1");
    }
}
