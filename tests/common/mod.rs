#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use remit_core::adapters::InMemoryStore;
use remit_core::config::Secret;
use remit_core::domain::{
    AdminProfile, Chain, PayoutRequest, Recipient, Transaction, TransactionType, WalletAddress,
};
use remit_core::ports::Repositories;
use remit_core::providers::{
    ApplicantRequest, ConversionStatus, CreatedWallet, CustodyProvider, KycProvider, PayoutOrder,
    PayoutProvider, PayoutReceipt, PayoutStatusReport, ProviderError, ProviderPayoutState,
    Providers, SwapConversion, SwapProvider, SwapQuote, VerificationReport, VerificationResult,
};
use remit_core::services::TransactionStateMachine;
use remit_core::AppState;

pub const SESSION_SECRET: &str = "test-session-secret";

/// Payout rail double that counts calls and can be slowed down or made to fail.
pub struct FakePayout {
    pub sends: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub delay: Duration,
    pub failure: Option<ProviderError>,
    pub state: Mutex<ProviderPayoutState>,
    pub references: Mutex<Vec<String>>,
}

impl FakePayout {
    pub fn ok() -> Self {
        Self {
            sends: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failure: None,
            state: Mutex::new(ProviderPayoutState::InProgress),
            references: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::ok() }
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn report(&self, state: ProviderPayoutState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl PayoutProvider for FakePayout {
    fn name(&self) -> &'static str {
        "fake-payout"
    }

    async fn send(&self, order: &PayoutOrder) -> Result<PayoutReceipt, ProviderError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.references.lock().unwrap().push(order.reference.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(PayoutReceipt {
            provider_request_id: format!("po_{}", order.reference),
            tracking_number: format!("TRK-{}", &order.reference[..8]),
        })
    }

    async fn status(&self, provider_request_id: &str) -> Result<PayoutStatusReport, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PayoutStatusReport {
            provider_request_id: provider_request_id.to_string(),
            state: *self.state.lock().unwrap(),
            error_message: Some("account closed".to_string()),
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct FakeSwap {
    pub quotes: AtomicUsize,
    pub executions: AtomicUsize,
    pub rate: BigDecimal,
    pub quote_ttl: chrono::Duration,
    pub execute_failure: Option<ProviderError>,
    /// Status `execute` reports.
    pub executed_as: ConversionStatus,
    /// Status `conversion_status` reports.
    pub settles_as: Mutex<ConversionStatus>,
    pub status_calls: AtomicUsize,
    pub unreachable: bool,
}

impl FakeSwap {
    pub fn ok() -> Self {
        Self {
            quotes: AtomicUsize::new(0),
            executions: AtomicUsize::new(0),
            rate: BigDecimal::from(17),
            quote_ttl: chrono::Duration::seconds(30),
            execute_failure: None,
            executed_as: ConversionStatus::Completed,
            settles_as: Mutex::new(ConversionStatus::Completed),
            status_calls: AtomicUsize::new(0),
            unreachable: false,
        }
    }

    /// Accepts conversions but leaves them pending until [`FakeSwap::settle`].
    pub fn pending_conversions() -> Self {
        Self {
            executed_as: ConversionStatus::Pending,
            settles_as: Mutex::new(ConversionStatus::Pending),
            ..Self::ok()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::ok()
        }
    }

    pub fn settle(&self, status: ConversionStatus) {
        *self.settles_as.lock().unwrap() = status;
    }

    pub fn expired_quotes() -> Self {
        Self {
            quote_ttl: chrono::Duration::seconds(-1),
            ..Self::ok()
        }
    }

    pub fn failing_execute(error: ProviderError) -> Self {
        Self {
            execute_failure: Some(error),
            ..Self::ok()
        }
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapProvider for FakeSwap {
    fn name(&self) -> &'static str {
        "fake-swap"
    }

    async fn quote(
        &self,
        _from_currency: &str,
        _to_currency: &str,
        amount: &BigDecimal,
    ) -> Result<SwapQuote, ProviderError> {
        let n = self.quotes.fetch_add(1, Ordering::SeqCst);
        Ok(SwapQuote {
            quote_id: format!("q{}", n + 1),
            rate: self.rate.clone(),
            from_amount: amount.clone(),
            to_amount: amount * &self.rate,
            expires_at: Utc::now() + self.quote_ttl,
        })
    }

    async fn execute(&self, quote_id: &str) -> Result<SwapConversion, ProviderError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.execute_failure {
            return Err(error.clone());
        }
        Ok(SwapConversion {
            conversion_id: format!("conv_{}", quote_id),
            status: self.executed_as,
        })
    }

    async fn conversion_status(&self, conversion_id: &str) -> Result<SwapConversion, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SwapConversion {
            conversion_id: conversion_id.to_string(),
            status: *self.settles_as.lock().unwrap(),
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        if self.unreachable {
            return Err(ProviderError::new("fake-swap", "http_401", "invalid api key"));
        }
        Ok(())
    }
}

pub struct FakeKyc {
    pub result: Mutex<Option<VerificationResult>>,
    pub applicants: AtomicUsize,
}

impl FakeKyc {
    pub fn new() -> Self {
        Self {
            result: Mutex::new(None),
            applicants: AtomicUsize::new(0),
        }
    }

    pub fn set_result(&self, result: VerificationResult) {
        *self.result.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl KycProvider for FakeKyc {
    fn name(&self) -> &'static str {
        "fake-kyc"
    }

    async fn create_applicant(&self, request: &ApplicantRequest) -> Result<String, ProviderError> {
        self.applicants.fetch_add(1, Ordering::SeqCst);
        Ok(format!("app_{}", request.external_id))
    }

    async fn create_verification(
        &self,
        applicant_id: &str,
        _types: &[String],
    ) -> Result<String, ProviderError> {
        Ok(format!("ver_{}", applicant_id))
    }

    async fn get_verification(&self, verification_id: &str) -> Result<VerificationReport, ProviderError> {
        Ok(VerificationReport {
            verification_id: verification_id.to_string(),
            status: "completed".to_string(),
            result: *self.result.lock().unwrap(),
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct FakeCustody {
    pub calls: AtomicUsize,
}

impl FakeCustody {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustodyProvider for FakeCustody {
    fn name(&self) -> &'static str {
        "fake-custody"
    }

    async fn create_wallet(&self, _wallet_name: &str, chains: &[Chain]) -> Result<CreatedWallet, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedWallet {
            wallet_id: "wallet_1".to_string(),
            addresses: chains
                .iter()
                .map(|chain| WalletAddress {
                    chain: *chain,
                    address: format!("{}-addr", chain),
                })
                .collect(),
        })
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// In-memory store, fake providers and the services wired the way the
/// server wires them.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub repos: Repositories,
    pub payout: Arc<FakePayout>,
    pub swap: Arc<FakeSwap>,
    pub kyc: Arc<FakeKyc>,
    pub custody: Arc<FakeCustody>,
    pub providers: Providers,
    pub timeout: Duration,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakePayout::ok(), FakeSwap::ok(), Duration::from_secs(5))
    }

    pub fn with(payout: FakePayout, swap: FakeSwap, timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let payout = Arc::new(payout);
        let swap = Arc::new(swap);
        let kyc = Arc::new(FakeKyc::new());
        let custody = Arc::new(FakeCustody::new());
        let providers = Providers {
            payout: payout.clone(),
            swap: swap.clone(),
            kyc: kyc.clone(),
            custody: custody.clone(),
        };
        Self {
            repos: Repositories::from_store(store.clone()),
            store,
            payout,
            swap,
            kyc,
            custody,
            providers,
            timeout,
        }
    }

    pub fn machine(&self) -> TransactionStateMachine {
        TransactionStateMachine::new(self.repos.clone(), self.providers.clone(), self.timeout)
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.repos.clone(),
            self.providers.clone(),
            Secret::new(SESSION_SECRET),
            self.timeout,
        )
    }

    pub fn seed_admin(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_admin(AdminProfile {
                id,
                role: "admin".to_string(),
                created_at: Utc::now(),
            })
            .unwrap();
        id
    }

    pub fn seed_deposit(&self, user_id: Uuid, amount: i64, currency: &str) -> Transaction {
        let tx = Transaction::new(
            user_id,
            format!("DEP-{}", &Uuid::new_v4().to_string()[..8]),
            TransactionType::Deposit,
            BigDecimal::from(amount),
            currency.to_string(),
            None,
        );
        self.store.insert_transaction(tx.clone()).unwrap();
        tx
    }

    pub fn seed_swap(&self, user_id: Uuid, amount: i64, from: &str, to: &str) -> Transaction {
        let tx = Transaction::new(
            user_id,
            format!("SWP-{}", &Uuid::new_v4().to_string()[..8]),
            TransactionType::Swap,
            BigDecimal::from(amount),
            from.to_string(),
            Some(to.to_string()),
        );
        self.store.insert_transaction(tx.clone()).unwrap();
        tx
    }

    pub fn seed_payout(&self, amount: i64) -> (Transaction, PayoutRequest) {
        self.seed_payout_to(mx_recipient(), amount)
    }

    pub fn seed_payout_to(&self, recipient: Recipient, amount: i64) -> (Transaction, PayoutRequest) {
        let tx = Transaction::new(
            Uuid::new_v4(),
            format!("PAY-{}", &Uuid::new_v4().to_string()[..8]),
            TransactionType::Payout,
            BigDecimal::from(amount),
            "MXN".to_string(),
            None,
        );
        let payout = PayoutRequest::new(tx.id, recipient, BigDecimal::from(amount), "MXN".to_string());
        self.store.insert_transaction(tx.clone()).unwrap();
        self.store.insert_payout(payout.clone()).unwrap();
        (tx, payout)
    }
}

pub fn mx_recipient() -> Recipient {
    Recipient {
        name: "Ana Torres".to_string(),
        account: "012180001234567897".to_string(),
        bank_name: "BBVA Mexico".to_string(),
        bank_code: Some("012".to_string()),
        country: "MX".to_string(),
    }
}
