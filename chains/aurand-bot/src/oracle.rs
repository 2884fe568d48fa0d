//! Oracle Loop - Poll, fetch, build, broadcast, recover, repeat
//!
//! One cycle at a time. Each cycle asks the contract how many commitments are
//! waiting; when there are any, it fetches one signed random value, wraps it
//! in a single `add_randomness` execution and races the signed transaction
//! across the configured endpoints.
//!
//! ```text
//! Idle -> Polling -> (count > 0) Fetching -> Submitting -> Idle
//!            \______________\_________________\-> Recovering -> Idle
//! ```
//!
//! Every cycle error goes through [`RecoveryManager`]. Errors classified as
//! permanent additionally stretch the idle delay with an exponential backoff
//! until a cycle stops failing that way.

use crate::broadcast::{Broadcaster, DeliveredTx};
use crate::chain::{ChainReader, GasSimulator};
use crate::error::{CycleError, ErrorClass, FatalError};
use crate::fee::FeePolicy;
use crate::randomness::{RandomRequest, RandomnessProvider};
use crate::recovery::RecoveryManager;
use crate::sequence::{SequenceTracker, SignData};
use crate::tx::TransactionBuilder;
use crate::wallet::TxSigner;
use core_logic::{BackoffConfig, MetricsCollector, CYCLE_TARGET};
use cosmrs::AccountId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleSettings {
    pub request: RandomRequest,
    /// Fixed delay between cycles
    pub poll_interval: Duration,
    /// Delay schedule while permanent errors repeat
    pub permanent_backoff: BackoffConfig,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            request: RandomRequest::default(),
            poll_interval: Duration::from_millis(1000),
            permanent_backoff: BackoffConfig::new(
                Duration::from_millis(1000),
                Duration::from_secs(300),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Polling,
    Fetching,
    Submitting,
    Recovering,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// No pending commitments
    Idle,
    Fulfilled(DeliveredTx),
}

/// Everything the loop needs, wired up by the caller.
pub struct OracleComponents {
    pub chain: Arc<dyn ChainReader>,
    pub provider: Arc<dyn RandomnessProvider>,
    pub simulator: Arc<dyn GasSimulator>,
    pub signer: Arc<dyn TxSigner>,
    pub broadcaster: Broadcaster,
    pub fee_policy: FeePolicy,
    pub contract: AccountId,
    pub metrics: Arc<MetricsCollector>,
}

pub struct Oracle {
    chain: Arc<dyn ChainReader>,
    provider: Arc<dyn RandomnessProvider>,
    simulator: Arc<dyn GasSimulator>,
    signer: Arc<dyn TxSigner>,
    broadcaster: Broadcaster,
    fee_policy: FeePolicy,
    builder: TransactionBuilder,
    recovery: RecoveryManager,
    tracker: SequenceTracker,
    settings: OracleSettings,
    metrics: Arc<MetricsCollector>,
    state: CycleState,
    /// Consecutive cycles that failed with a permanent error
    permanent_streak: u32,
}

impl Oracle {
    /// Reads chain truth for the bot account and returns a ready loop.
    pub async fn bootstrap(
        components: OracleComponents,
        settings: OracleSettings,
    ) -> Result<Self, FatalError> {
        let OracleComponents {
            chain,
            provider,
            simulator,
            signer,
            broadcaster,
            fee_policy,
            contract,
            metrics,
        } = components;

        let address = signer.address().clone();
        let recovery = RecoveryManager::new(Arc::clone(&chain), address.to_string())
            .with_metrics(Arc::clone(&metrics));
        let tracker = recovery.load().await?;

        Ok(Self {
            chain,
            provider,
            simulator,
            signer,
            broadcaster: broadcaster.with_metrics(Arc::clone(&metrics)),
            fee_policy,
            builder: TransactionBuilder::new(address, contract),
            recovery,
            tracker,
            settings,
            metrics,
            state: CycleState::Idle,
            permanent_streak: 0,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Sign data the next transaction will use
    pub fn sign_data(&self) -> &SignData {
        self.tracker.current()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn permanent_streak(&self) -> u32 {
        self.permanent_streak
    }

    /// One pass through the state machine, without recovery.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.state = CycleState::Polling;
        debug!("Waiting for commitments ...");
        let pending = self.chain.pending_commitment_count().await?;
        if pending == 0 {
            return Ok(CycleReport::Idle);
        }

        self.state = CycleState::Fetching;
        info!(pending, "Detect commitments ...");
        info!("Get random org randomness ...");
        let request = self.settings.request;
        let value = self.provider.fetch_signed_random(request).await?;
        value.validate(&request)?;
        info!(
            serial = value.serial_number(),
            "Receive random value with completion time: {}",
            value.completion_time()
        );

        self.state = CycleState::Submitting;
        let pending_tx = self.builder.build(&value);
        let fee = self
            .fee_policy
            .estimate_fee(
                &pending_tx,
                self.signer.as_ref(),
                self.tracker.current(),
                self.simulator.as_ref(),
            )
            .await?;
        debug!(%fee, "Fee selected");

        // Consumed here: from now on a failure means the chain may or may
        // not have seen this sequence, and only a resync can tell
        let sign_data = self.tracker.next();
        let delivered = self
            .broadcaster
            .sign_and_broadcast(self.signer.as_ref(), &pending_tx, &fee, &sign_data)
            .await?;

        info!(
            target: CYCLE_TARGET,
            endpoint = %delivered.endpoint,
            "SUCCESS (Gas: {}/{}; Block height: {}; Transaction: {})",
            delivered.gas_used,
            delivered.gas_wanted,
            delivered.height,
            delivered.transaction_hash
        );

        Ok(CycleReport::Fulfilled(delivered))
    }

    /// Runs one cycle, recovers if it failed and returns how long to sleep
    /// before the next one. Only a failed recovery is returned as an error.
    pub async fn tick(&mut self) -> Result<Duration, FatalError> {
        let delay = match self.run_cycle().await {
            Ok(report) => {
                match report {
                    CycleReport::Idle => self.metrics.record_idle_cycle(),
                    CycleReport::Fulfilled(_) => self.metrics.record_fulfilled_cycle(),
                }
                self.permanent_streak = 0;
                self.settings.poll_interval
            }
            Err(err) => {
                self.metrics.record_failed_cycle();
                self.state = CycleState::Recovering;
                self.recovery.on_cycle_error(&err, &mut self.tracker).await?;
                self.delay_after(&err)
            }
        };

        self.state = CycleState::Idle;
        Ok(delay)
    }

    fn delay_after(&mut self, err: &CycleError) -> Duration {
        if err.class() == ErrorClass::Transient {
            self.permanent_streak = 0;
            return self.settings.poll_interval;
        }

        let delay = self
            .settings
            .permanent_backoff
            .delay_for(self.permanent_streak)
            .max(self.settings.poll_interval);
        self.permanent_streak = self.permanent_streak.saturating_add(1);

        warn!(
            escalation = true,
            streak = self.permanent_streak,
            delay_ms = delay.as_millis() as u64,
            "Permanent error, backing off before next cycle"
        );
        delay
    }

    /// Loops until `shutdown` is cancelled. A cycle in flight is finished
    /// first; cancellation only interrupts the idle delay.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), FatalError> {
        info!(
            endpoints = self.broadcaster.endpoint_count(),
            "🚀 Oracle loop started"
        );

        while !shutdown.is_cancelled() {
            let delay = self.tick().await?;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("🛑 Oracle loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = OracleSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.request.amount, 32);
        assert_eq!(settings.request.max, 255);
        assert_eq!(settings.permanent_backoff.delay_for(0), Duration::from_secs(1));
        assert_eq!(settings.permanent_backoff.delay_for(3), Duration::from_secs(8));
        assert_eq!(
            settings.permanent_backoff.delay_for(20),
            Duration::from_secs(300)
        );
    }
}
