//! Recovery - Resynchronize sign data after a failed cycle
//!
//! After any failure the local sequence may be ahead of the chain (a signed
//! transaction never landed) or behind it (a "failed" broadcast actually made
//! it in). Either way the only safe move is to read chain truth again. A
//! failure of that read is the one error the bot cannot absorb.

use crate::chain::ChainReader;
use crate::error::{CycleError, ErrorClass, FatalError};
use crate::sequence::{SequenceTracker, SignData};
use core_logic::MetricsCollector;
use std::sync::Arc;
use tracing::{error, info};

pub struct RecoveryManager {
    chain: Arc<dyn ChainReader>,
    address: String,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RecoveryManager {
    pub fn new(chain: Arc<dyn ChainReader>, address: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Tracker initialized from chain truth, for startup.
    pub async fn load(&self) -> Result<SequenceTracker, FatalError> {
        let truth = self.chain_truth().await?;
        info!("Sign data set to: {}", truth);
        Ok(SequenceTracker::new(truth))
    }

    async fn chain_truth(&self) -> Result<SignData, FatalError> {
        self.chain
            .chain_truth(&self.address)
            .await
            .map_err(|source| FatalError::Resync {
                address: self.address.clone(),
                source,
            })
    }

    /// Overwrites `tracker` with the chain's view of the account.
    pub async fn resync(&self, tracker: &mut SequenceTracker) -> Result<(), FatalError> {
        let truth = self.chain_truth().await?;
        info!("Sign data set to: {}", truth);
        tracker.reset(truth);

        if let Some(metrics) = &self.metrics {
            metrics.record_resync();
        }
        Ok(())
    }

    /// Logs a cycle failure and resyncs. The cycle error itself is consumed
    /// here; only a failed resync comes back out.
    pub async fn on_cycle_error(
        &self,
        err: &CycleError,
        tracker: &mut SequenceTracker,
    ) -> Result<(), FatalError> {
        match err.class() {
            ErrorClass::Permanent => error!(escalation = true, "Cycle FAILED: {}", err),
            ErrorClass::Transient => error!("Cycle FAILED: {}", err),
        }

        info!("Resetting sign data ...");
        self.resync(tracker).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BotInfo;
    use crate::error::ChainError;
    use async_trait::async_trait;
    use core_logic::NetworkError;
    use std::sync::Mutex;

    struct TruthOnly(Mutex<Result<SignData, ChainError>>);

    #[async_trait]
    impl ChainReader for TruthOnly {
        async fn pending_commitment_count(&self) -> Result<u64, ChainError> {
            Ok(0)
        }

        async fn bot_info(&self, _address: &str) -> Result<Option<BotInfo>, ChainError> {
            Ok(None)
        }

        async fn chain_truth(&self, _address: &str) -> Result<SignData, ChainError> {
            self.0.lock().unwrap().clone()
        }

        async fn balance(&self, _address: &str, _denom: &str) -> Result<u128, ChainError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_cycle_error_resets_to_chain_truth() {
        let chain = Arc::new(TruthOnly(Mutex::new(Ok(SignData::new("aura", 4, 42)))));
        let metrics = Arc::new(MetricsCollector::default());
        let recovery = RecoveryManager::new(chain, "aura1bot").with_metrics(metrics.clone());

        let mut tracker = SequenceTracker::new(SignData::new("aura", 4, 45));
        let err = CycleError::Chain(ChainError::Rpc {
            endpoint: "http://a".to_string(),
            reason: "boom".to_string(),
        });

        recovery.on_cycle_error(&err, &mut tracker).await.unwrap();
        assert_eq!(tracker.next(), SignData::new("aura", 4, 42));
        assert_eq!(metrics.resyncs(), 1);
    }

    #[tokio::test]
    async fn test_failed_resync_is_fatal_and_keeps_state() {
        let chain = Arc::new(TruthOnly(Mutex::new(Err(ChainError::Network(
            NetworkError::Timeout {
                timeout_ms: 30_000,
                endpoint: "http://a".to_string(),
            },
        )))));
        let recovery = RecoveryManager::new(chain, "aura1bot");

        let mut tracker = SequenceTracker::new(SignData::new("aura", 4, 45));
        let err = recovery.resync(&mut tracker).await.unwrap_err();

        assert!(matches!(err, FatalError::Resync { ref address, .. } if address == "aura1bot"));
        assert_eq!(tracker.current().sequence, 45);
    }
}
