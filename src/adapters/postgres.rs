//! Postgres implementation of every storage port.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::domain::{
    AdminProfile, CustodyWallet, KycDocument, KycRecord, KycStatus, LedgerEntry, PayoutRequest,
    PayoutStatus, Recipient, Transaction, TransactionStatus, WalletAddress,
};
use crate::ports::{
    AdminRepository, ClientRepository, KycRepository, KycUpdate, LedgerRepository,
    PayoutDispatch, PayoutRepository, PayoutSettlement, RepositoryError, RepositoryResult,
    StatusCommit, TransactionRepository,
};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Applies the migrations under `./migrations`.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

fn parse<T>(value: &str) -> RepositoryResult<T>
where
    T: std::str::FromStr<Err = crate::domain::ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: crate::domain::ParseEnumError| RepositoryError::Corrupt(e.to_string()))
}

/// Guarded status update plus ledger inserts. Returns `false` when the guard
/// fails, in which case the caller must roll back.
async fn apply_commit(
    executor: &mut SqlxTransaction<'_, Postgres>,
    commit: &StatusCommit,
) -> RepositoryResult<bool> {
    let updated = sqlx::query(
        "UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(commit.to.as_str())
    .bind(commit.transaction_id)
    .bind(commit.from.as_str())
    .execute(&mut **executor)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(false);
    }

    for entry in &commit.entries {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, transaction_id, account, debit, credit, currency, description, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.transaction_id)
        .bind(&entry.account)
        .bind(&entry.debit)
        .bind(&entry.credit)
        .bind(&entry.currency)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut **executor)
        .await?;
    }

    Ok(true)
}

#[async_trait]
impl TransactionRepository for PostgresStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            "UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn commit(&self, commit: StatusCommit) -> RepositoryResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !apply_commit(&mut tx, &commit).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn record_conversion(
        &self,
        id: Uuid,
        conversion_id: &str,
        converted_amount: &BigDecimal,
    ) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET conversion_id = $1, converted_amount = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4 AND conversion_id IS NULL
            "#,
        )
        .bind(conversion_id)
        .bind(converted_amount)
        .bind(id)
        .bind(TransactionStatus::SwapProcessing.as_str())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn abandon_conversion(&self, id: Uuid, conversion_id: &str) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, conversion_id = NULL, converted_amount = NULL, updated_at = NOW()
            WHERE id = $2 AND status = $3 AND conversion_id = $4
            "#,
        )
        .bind(TransactionStatus::SwapPending.as_str())
        .bind(id)
        .bind(TransactionStatus::SwapProcessing.as_str())
        .bind(conversion_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn count_by_status(&self) -> RepositoryResult<Vec<(TransactionStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM transactions GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse(&status)?, count)))
            .collect()
    }
}

#[async_trait]
impl PayoutRepository for PostgresStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<PayoutRequest> {
        let row = sqlx::query_as::<_, PayoutRow>("SELECT * FROM payout_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("payout request {}", id)))?
            .into_domain()
    }

    async fn find_by_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Option<PayoutRequest>> {
        let row = sqlx::query_as::<_, PayoutRow>(
            "SELECT * FROM payout_requests WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PayoutRow::into_domain).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PayoutRequest>> {
        let rows = sqlx::query_as::<_, PayoutRow>(
            "SELECT * FROM payout_requests ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PayoutRow::into_domain).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            "UPDATE payout_requests SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn commit_dispatch(&self, dispatch: PayoutDispatch) -> RepositoryResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = $1, sent_at = $2, provider_request_id = $3, tracking_number = $4,
                updated_at = NOW()
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(PayoutStatus::Sent.as_str())
        .bind(dispatch.sent_at)
        .bind(&dispatch.provider_request_id)
        .bind(&dispatch.tracking_number)
        .bind(dispatch.payout_id)
        .bind(PayoutStatus::Processing.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 || !apply_commit(&mut tx, &dispatch.transaction).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn commit_settlement(&self, settlement: PayoutSettlement) -> RepositoryResult<bool> {
        let completed_at = (settlement.outcome == PayoutStatus::Completed).then_some(settlement.settled_at);
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = $1, completed_at = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(settlement.outcome.as_str())
        .bind(completed_at)
        .bind(settlement.payout_id)
        .bind(PayoutStatus::Sent.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 || !apply_commit(&mut tx, &settlement.transaction).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl LedgerRepository for PostgresStore {
    async fn list_for_transaction(&self, transaction_id: Uuid) -> RepositoryResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT * FROM ledger_entries WHERE transaction_id = $1 ORDER BY created_at ASC",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerRow::into_domain).collect())
    }
}

impl PostgresStore {
    async fn documents_for(&self, kyc_ids: &[Uuid]) -> RepositoryResult<HashMap<Uuid, Vec<KycDocument>>> {
        let rows = sqlx::query_as::<_, KycDocumentRow>(
            "SELECT * FROM kyc_documents WHERE kyc_id = ANY($1) ORDER BY uploaded_at ASC",
        )
        .bind(kyc_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<KycDocument>> = HashMap::new();
        for row in rows {
            grouped.entry(row.kyc_id).or_default().push(row.into_domain());
        }
        Ok(grouped)
    }

    async fn with_documents(&self, rows: Vec<KycRow>) -> RepositoryResult<Vec<KycRecord>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut documents = self.documents_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let docs = documents.remove(&row.id).unwrap_or_default();
                row.into_domain(docs)
            })
            .collect()
    }
}

#[async_trait]
impl KycRepository for PostgresStore {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<KycRecord> {
        let row = sqlx::query_as::<_, KycRow>("SELECT * FROM kyc_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("KYC record {}", id)))?;

        let mut records = self.with_documents(vec![row]).await?;
        records
            .pop()
            .ok_or_else(|| RepositoryError::NotFound(format!("KYC record {}", id)))
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<KycRecord>> {
        let row = sqlx::query_as::<_, KycRow>(
            "SELECT * FROM kyc_records WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_documents(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<KycRecord>> {
        let rows = sqlx::query_as::<_, KycRow>(
            "SELECT * FROM kyc_records ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.with_documents(rows).await
    }

    async fn update_status(&self, update: KycUpdate) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE kyc_records
            SET status = $1, notes = notes || $2::text[], updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(update.to.as_str())
        .bind(&update.notes)
        .bind(update.kyc_id)
        .bind(update.from.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            // Distinguish a lost guard from a missing record.
            KycRepository::get_by_id(self, update.kyc_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn attach_verification(
        &self,
        update: KycUpdate,
        applicant_id: &str,
        verification_id: &str,
    ) -> RepositoryResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE kyc_records
            SET status = $1, notes = notes || $2::text[], applicant_id = $3,
                verification_id = $4, updated_at = NOW()
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(update.to.as_str())
        .bind(&update.notes)
        .bind(applicant_id)
        .bind(verification_id)
        .bind(update.kyc_id)
        .bind(update.from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn count_by_status(&self) -> RepositoryResult<Vec<(KycStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM kyc_records GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse(&status)?, count)))
            .collect()
    }
}

#[async_trait]
impl AdminRepository for PostgresStore {
    async fn find_admin(&self, user_id: Uuid) -> RepositoryResult<Option<AdminProfile>> {
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT id, role, created_at FROM admin_profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, role, created_at)| AdminProfile { id, role, created_at }))
    }
}

#[async_trait]
impl ClientRepository for PostgresStore {
    async fn count_clients(&self) -> RepositoryResult<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM client_profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_wallet(&self, user_id: Uuid) -> RepositoryResult<Option<CustodyWallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM custody_wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(WalletRow::into_domain))
    }

    async fn insert_wallet(&self, wallet: &CustodyWallet) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO custody_wallets (id, user_id, provider_wallet_id, addresses, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(&wallet.provider_wallet_id)
        .bind(Json(&wallet.addresses))
        .bind(wallet.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(format!("wallet for client {}", wallet.user_id))
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    reference_number: String,
    transaction_type: String,
    status: String,
    amount: BigDecimal,
    currency: String,
    target_currency: Option<String>,
    conversion_id: Option<String>,
    converted_amount: Option<BigDecimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            reference_number: self.reference_number,
            transaction_type: parse(&self.transaction_type)?,
            status: parse(&self.status)?,
            amount: self.amount,
            currency: self.currency,
            target_currency: self.target_currency,
            conversion_id: self.conversion_id,
            converted_amount: self.converted_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayoutRow {
    id: Uuid,
    transaction_id: Uuid,
    recipient_name: String,
    recipient_account: String,
    recipient_bank: String,
    recipient_bank_code: Option<String>,
    recipient_country: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    sent_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    provider_request_id: Option<String>,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PayoutRow {
    fn into_domain(self) -> RepositoryResult<PayoutRequest> {
        Ok(PayoutRequest {
            id: self.id,
            transaction_id: self.transaction_id,
            recipient: Recipient {
                name: self.recipient_name,
                account: self.recipient_account,
                bank_name: self.recipient_bank,
                bank_code: self.recipient_bank_code,
                country: self.recipient_country,
            },
            amount: self.amount,
            currency: self.currency,
            status: parse(&self.status)?,
            sent_at: self.sent_at,
            completed_at: self.completed_at,
            provider_request_id: self.provider_request_id,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    transaction_id: Uuid,
    account: String,
    debit: BigDecimal,
    credit: BigDecimal,
    currency: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_domain(self) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            account: self.account,
            debit: self.debit,
            credit: self.credit,
            currency: self.currency,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KycRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    notes: Vec<String>,
    applicant_id: Option<String>,
    verification_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl KycRow {
    fn into_domain(self, documents: Vec<KycDocument>) -> RepositoryResult<KycRecord> {
        Ok(KycRecord {
            id: self.id,
            user_id: self.user_id,
            status: parse(&self.status)?,
            notes: self.notes,
            documents,
            applicant_id: self.applicant_id,
            verification_id: self.verification_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KycDocumentRow {
    id: Uuid,
    kyc_id: Uuid,
    document_type: String,
    file_reference: String,
    uploaded_at: DateTime<Utc>,
}

impl KycDocumentRow {
    fn into_domain(self) -> KycDocument {
        KycDocument {
            id: self.id,
            kyc_id: self.kyc_id,
            document_type: self.document_type,
            file_reference: self.file_reference,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    user_id: Uuid,
    provider_wallet_id: String,
    addresses: Json<Vec<WalletAddress>>,
    created_at: DateTime<Utc>,
}

impl WalletRow {
    fn into_domain(self) -> CustodyWallet {
        CustodyWallet {
            id: self.id,
            user_id: self.user_id,
            provider_wallet_id: self.provider_wallet_id,
            addresses: self.addresses.0,
            created_at: self.created_at,
        }
    }
}
