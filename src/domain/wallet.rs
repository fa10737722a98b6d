//! Custody wallet held for a client at the custody provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    /// Chains a client wallet receives stablecoins on.
    pub enum Chain as "chain" {
        Ethereum => "ethereum",
        Solana => "solana",
        Tron => "tron",
    }
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Ethereum, Chain::Solana, Chain::Tron];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub chain: Chain,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustodyWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_wallet_id: String,
    pub addresses: Vec<WalletAddress>,
    pub created_at: DateTime<Utc>,
}
