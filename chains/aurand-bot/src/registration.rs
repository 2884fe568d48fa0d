//! Bot registration with the aurand contract.
//!
//! A bot has to be registered (moniker plus a hash of its provider API key)
//! before the contract accepts its randomness. Registration happens once, at
//! startup, and uses its own freshly queried sign data.

use crate::broadcast::Broadcaster;
use crate::chain::{ChainReader, GasSimulator};
use crate::error::{CycleError, FatalError, StartupError};
use crate::fee::FeePolicy;
use crate::tx::PendingTransaction;
use crate::wallet::TxSigner;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cosmrs::AccountId;
use sha2::{Digest, Sha512};
use std::time::Duration;
use tracing::{info, warn};

/// Minimum pause between the registration transaction and the next
/// sign data query, so the node reports the bumped sequence.
pub const REGISTRATION_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// base64(sha512(api_key)), as stored by the contract
pub fn hash_api_key(api_key: &str) -> String {
    STANDARD.encode(Sha512::digest(api_key.as_bytes()))
}

pub struct Registration<'a> {
    pub chain: &'a dyn ChainReader,
    pub simulator: &'a dyn GasSimulator,
    pub signer: &'a dyn TxSigner,
    pub broadcaster: &'a Broadcaster,
    pub fee_policy: &'a FeePolicy,
    pub contract: &'a AccountId,
}

impl Registration<'_> {
    /// Registers the bot unless the contract already knows it.
    ///
    /// Returns `true` when a registration transaction was sent.
    pub async fn ensure_registered(
        &self,
        moniker: &str,
        api_key: &str,
    ) -> Result<bool, StartupError> {
        let address = self.signer.address().to_string();

        let existing = self
            .chain
            .bot_info(&address)
            .await
            .map_err(CycleError::from)?;
        if let Some(info) = existing {
            info!("Bot information: {}", info);
            return Ok(false);
        }

        info!(moniker, "Registering this bot ...");
        let pending = PendingTransaction::register_bot(
            self.signer.address().clone(),
            self.contract.clone(),
            hash_api_key(api_key),
            moniker.to_string(),
        );

        let sign_data = self
            .chain
            .chain_truth(&address)
            .await
            .map_err(|source| FatalError::Resync {
                address: address.clone(),
                source,
            })?;

        let fee = self
            .fee_policy
            .estimate_fee(&pending, self.signer, &sign_data, self.simulator)
            .await
            .map_err(CycleError::from)?;

        let delivered = self
            .broadcaster
            .sign_and_broadcast(self.signer, &pending, &fee, &sign_data)
            .await
            .map_err(CycleError::from)?;
        info!(
            height = delivered.height,
            tx_hash = %delivered.transaction_hash,
            "Bot registration Success"
        );

        // Wait out the settle delay while reading back what the contract stored
        let report = async {
            match self.chain.bot_info(&address).await {
                Ok(Some(info)) => info!("Bot information: {}", info),
                Ok(None) => warn!("Bot information not visible yet"),
                Err(e) => warn!(error = %e, "Failed to read bot information"),
            }
        };
        tokio::join!(tokio::time::sleep(REGISTRATION_SETTLE_DELAY), report);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key() {
        // sha512("") in base64
        assert_eq!(
            hash_api_key(""),
            "z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg=="
        );
        assert_ne!(hash_api_key("key-a"), hash_api_key("key-b"));
        assert_eq!(hash_api_key("key-a").len(), 88);
    }
}
