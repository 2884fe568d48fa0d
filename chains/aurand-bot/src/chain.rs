//! Read-only access to the chain and the contract.
//!
//! The oracle only talks to the chain through these traits so the loop can be
//! driven against in-memory fakes in tests.

use crate::error::ChainError;
use crate::sequence::SignData;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bot record as stored by the contract. Only ever logged, so it is kept as
/// opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotInfo(pub serde_json::Value);

impl fmt::Display for BotInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Number of randomness requests waiting for a bot.
    async fn pending_commitment_count(&self) -> Result<u64, ChainError>;

    /// `None` when the address has never registered.
    async fn bot_info(&self, address: &str) -> Result<Option<BotInfo>, ChainError>;

    /// Chain id, account number and the sequence the chain expects next.
    async fn chain_truth(&self, address: &str) -> Result<SignData, ChainError>;

    async fn balance(&self, address: &str, denom: &str) -> Result<u128, ChainError>;
}

#[async_trait]
pub trait GasSimulator: Send + Sync {
    /// Gas used when executing `tx_bytes` (a signed-shape `TxRaw`) without
    /// committing it.
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, ChainError>;
}
