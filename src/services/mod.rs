pub mod dashboard;
pub mod kyc_review;
pub mod ledger;
pub mod transaction_machine;
pub mod wallets;

pub use dashboard::{DashboardService, DashboardStats};
pub use kyc_review::KycReviewFlow;
pub use ledger::{LedgerError, LedgerWriter};
pub use transaction_machine::{
    ActionOutcome, PayoutDispatched, PayoutRefreshed, SwapRefreshed, TransactionStateMachine,
};
pub use wallets::WalletProvisioning;
