//! Custody wallet provisioning for KYC-approved clients.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Chain, CustodyWallet, KycStatus};
use crate::error::AppError;
use crate::ports::Repositories;
use crate::providers::{self, Providers};

#[derive(Clone)]
pub struct WalletProvisioning {
    repos: Repositories,
    providers: Providers,
    provider_timeout: Duration,
}

impl WalletProvisioning {
    pub fn new(repos: Repositories, providers: Providers, provider_timeout: Duration) -> Self {
        Self {
            repos,
            providers,
            provider_timeout,
        }
    }

    /// Returns the client's wallet, creating it at the custody provider on
    /// first use. The flag is `true` when a wallet was created.
    pub async fn provision(&self, user_id: Uuid) -> Result<(CustodyWallet, bool), AppError> {
        if let Some(wallet) = self.repos.clients.find_wallet(user_id).await? {
            return Ok((wallet, false));
        }

        let kyc = self
            .repos
            .kyc
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("KYC record for client {}", user_id)))?;
        if kyc.status != KycStatus::Approved {
            return Err(AppError::InvalidStateTransition(format!(
                "Client {} KYC is {}, wallets require approved KYC",
                user_id, kyc.status
            )));
        }

        let custody = &self.providers.custody;
        let created = providers::with_timeout(
            custody.name(),
            self.provider_timeout,
            custody.create_wallet(&format!("client-{}", user_id), &Chain::ALL),
        )
        .await?;

        let wallet = CustodyWallet {
            id: Uuid::new_v4(),
            user_id,
            provider_wallet_id: created.wallet_id,
            addresses: created.addresses,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repos.clients.insert_wallet(&wallet).await {
            tracing::error!(
                user_id = %user_id,
                provider_wallet_id = %wallet.provider_wallet_id,
                error = %e,
                "Wallet created at provider but not stored"
            );
            return Err(AppError::Internal(format!(
                "Wallet {} was created but could not be stored",
                wallet.provider_wallet_id
            )));
        }

        tracing::info!(user_id = %user_id, provider_wallet_id = %wallet.provider_wallet_id, "Client wallet provisioned");
        Ok((wallet, true))
    }
}
