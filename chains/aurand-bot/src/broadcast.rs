//! Broadcaster - Sign once, race the same bytes across every endpoint
//!
//! The signed transaction is handed to one spawned task per endpoint (a
//! primary plus up to two secondaries). The race resolves on the first
//! endpoint that reports on-chain success; a transport success carrying a
//! non-zero result code counts as a failure for that endpoint.
//!
//! Losing submissions are never cancelled. They keep running after the race
//! resolves and still log their outcome and update the endpoint's health.
//!
//! # Example
//!
//! ```rust,no_run
//! use aurand_bot::{Broadcaster, CosmosRpc};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(tx_bytes: bytes::Bytes) -> anyhow::Result<()> {
//! let timeout = Duration::from_secs(30);
//! let primary = Arc::new(CosmosRpc::connect("https://rpc.aura.network", timeout).await?);
//! let backup = Arc::new(CosmosRpc::connect("https://rpc-2.aura.network", timeout).await?);
//!
//! let broadcaster = Broadcaster::new("https://rpc.aura.network", primary)
//!     .with_secondary("https://rpc-2.aura.network", backup)?;
//!
//! let delivered = broadcaster.race(tx_bytes).await?;
//! println!("{} at height {}", delivered.transaction_hash, delivered.height);
//! # Ok(())
//! # }
//! ```

use crate::error::{BroadcastError, ChainError, EndpointFailure, SubmitError};
use crate::fee::Fee;
use crate::sequence::SignData;
use crate::tx::PendingTransaction;
use crate::wallet::TxSigner;
use async_trait::async_trait;
use bytes::Bytes;
use core_logic::{ConfigError, MetricsCollector, RpcEndpoint, RpcHealthStatus};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Primary plus two secondaries
pub const MAX_ENDPOINTS: usize = 3;

/// What a node reports for a committed (or rejected) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResponse {
    /// 0 on success
    pub code: u32,
    pub log: String,
    pub transaction_hash: String,
    pub height: u64,
    pub gas_used: u64,
    pub gas_wanted: u64,
}

#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Submits the raw bytes and waits for the transaction to be committed.
    async fn broadcast_tx(&self, tx_bytes: Bytes) -> Result<TxResponse, ChainError>;
}

/// A transaction accepted on-chain, as reported by the winning endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredTx {
    pub endpoint: String,
    pub transaction_hash: String,
    pub height: u64,
    pub gas_used: u64,
    pub gas_wanted: u64,
}

pub type BroadcastOutcome = Result<DeliveredTx, BroadcastError>;

struct BroadcastEndpoint {
    health: Arc<RpcEndpoint>,
    submitter: Arc<dyn TxSubmitter>,
}

pub struct Broadcaster {
    endpoints: Vec<BroadcastEndpoint>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Broadcaster {
    pub fn new(primary_url: impl Into<String>, primary: Arc<dyn TxSubmitter>) -> Self {
        Self {
            endpoints: vec![BroadcastEndpoint {
                health: Arc::new(RpcEndpoint::new("primary", primary_url)),
                submitter: primary,
            }],
            metrics: None,
        }
    }

    /// Adds a secondary endpoint, labelled `secondary-1`, `secondary-2`.
    pub fn with_secondary(
        mut self,
        url: impl Into<String>,
        submitter: Arc<dyn TxSubmitter>,
    ) -> Result<Self, ConfigError> {
        let url = url.into();
        if self.endpoints.len() >= MAX_ENDPOINTS {
            return Err(ConfigError::invalid(
                "ENDPOINT",
                format!(
                    "at most {} broadcast endpoints are supported, cannot add {}",
                    MAX_ENDPOINTS, url
                ),
            ));
        }

        let label = format!("secondary-{}", self.endpoints.len());
        self.endpoints.push(BroadcastEndpoint {
            health: Arc::new(RpcEndpoint::new(label, url)),
            submitter,
        });
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn endpoint_health(&self) -> Vec<RpcHealthStatus> {
        self.endpoints.iter().map(|e| e.health.status()).collect()
    }

    /// Signs exactly once with `sign_data`, then races the bytes.
    pub async fn sign_and_broadcast(
        &self,
        signer: &dyn TxSigner,
        pending: &PendingTransaction,
        fee: &Fee,
        sign_data: &SignData,
    ) -> BroadcastOutcome {
        let tx_bytes = signer.sign(pending, fee, sign_data)?;
        debug!(
            sequence = sign_data.sequence,
            size = tx_bytes.len(),
            "Signed transaction"
        );
        self.race(tx_bytes).await
    }

    /// Submits identical bytes to every endpoint concurrently. First success
    /// wins; if every endpoint fails, all causes are returned.
    pub async fn race(&self, tx_bytes: Bytes) -> BroadcastOutcome {
        let started = Instant::now();
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            let health = Arc::clone(&endpoint.health);
            let submitter = Arc::clone(&endpoint.submitter);
            let tx_bytes = tx_bytes.clone();
            let results_tx = results_tx.clone();

            tokio::spawn(async move {
                let sent_at = Instant::now();
                let outcome = submit(submitter.as_ref(), tx_bytes).await;
                let latency = sent_at.elapsed();

                match &outcome {
                    Ok(response) => {
                        health.record_success(latency);
                        info!(
                            endpoint = %health.label,
                            latency_ms = latency.as_millis() as u64,
                            tx_hash = %response.transaction_hash,
                            "Broadcast {} succeeded",
                            index + 1
                        );
                    }
                    Err(e) => {
                        health.record_failure(latency, &e.to_string());
                        warn!(
                            endpoint = %health.label,
                            latency_ms = latency.as_millis() as u64,
                            "Broadcast {} failed: {}",
                            index + 1,
                            e
                        );
                    }
                }

                // The race may already be decided; nobody listening is fine
                let _ = results_tx.send((index, outcome));
            });
        }
        drop(results_tx);

        let mut causes: Vec<Option<SubmitError>> = vec![None; self.endpoints.len()];
        while let Some((index, outcome)) = results_rx.recv().await {
            match outcome {
                Ok(response) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_race_latency(started.elapsed());
                    }
                    return Ok(DeliveredTx {
                        endpoint: self.endpoints[index].health.label.clone(),
                        transaction_hash: response.transaction_hash,
                        height: response.height,
                        gas_used: response.gas_used,
                        gas_wanted: response.gas_wanted,
                    });
                }
                Err(cause) => causes[index] = Some(cause),
            }
        }

        // Every sender is gone: each task either reported a failure or died
        let failures = self
            .endpoints
            .iter()
            .zip(causes)
            .map(|(endpoint, cause)| EndpointFailure {
                endpoint: endpoint.health.label.clone(),
                cause: cause.unwrap_or(SubmitError::TaskLost),
            })
            .collect();

        Err(BroadcastError::AllFailed(failures))
    }
}

async fn submit(submitter: &dyn TxSubmitter, tx_bytes: Bytes) -> Result<TxResponse, SubmitError> {
    let response = submitter.broadcast_tx(tx_bytes).await?;
    if response.code != 0 {
        return Err(SubmitError::DeliveryFailed {
            hash: response.transaction_hash,
            code: response.code,
            log: response.log,
        });
    }
    Ok(response)
}
