//! Error taxonomy for the oracle.
//!
//! Every failure inside a cycle ends up as a [`CycleError`], which the
//! recovery path logs and absorbs. Only [`FatalError`] stops the process.

use core_logic::NetworkError;
use thiserror::Error;

/// Failures talking to the chain (queries, simulation, broadcast transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("RPC error from {endpoint}: {reason}")]
    Rpc { endpoint: String, reason: String },

    #[error("Query {path} failed with code {code}: {log}")]
    QueryFailed { path: String, code: u32, log: String },

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("Account {address} not found on chain")]
    AccountNotFound { address: String },
}

/// Failures reported by, or while talking to, the randomness provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Randomness provider error {code}: {message} (fields: {data:?})")]
    Api {
        code: i64,
        message: String,
        data: Vec<serde_json::Value>,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Malformed randomness response: {reason}")]
    InvalidResponse { reason: String },
}

impl ProviderError {
    /// Errors that will not go away by asking again: malformed or rejected
    /// parameters and unknown or stopped credentials. Allowance exhaustion
    /// (402/403) resets on the provider side and is not permanent.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::Api { code, .. } => matches!(*code, 100..=399 | 400 | 401),
            ProviderError::Network(_) | ProviderError::InvalidResponse { .. } => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Invalid chain id '{chain_id}': {reason}")]
    InvalidChainId { chain_id: String, reason: String },

    #[error("Failed to encode transaction: {0}")]
    Encode(String),

    #[error("Failed to sign transaction: {0}")]
    Sign(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Failed to build simulation transaction: {0}")]
    Encode(#[from] SigningError),

    #[error("Gas simulation failed: {0}")]
    Simulation(#[from] ChainError),

    #[error("Fee amount overflows for gas limit {gas_limit}")]
    Overflow { gas_limit: u64 },
}

/// Why a single endpoint did not deliver the transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Transaction {hash} failed on-chain with code {code}: {log}")]
    DeliveryFailed { hash: String, code: u32, log: String },

    #[error("Broadcast task ended without reporting a result")]
    TaskLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub cause: SubmitError,
}

fn summarize(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.endpoint, f.cause))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("All {} broadcast endpoints failed: {}", .0.len(), summarize(.0))]
    AllFailed(Vec<EndpointFailure>),
}

/// Anything that can abort a single oracle cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("Chain query failed: {0}")]
    Chain(#[from] ChainError),

    #[error("Randomness request failed: {0}")]
    Randomness(#[from] ProviderError),

    #[error("Fee estimation failed: {0}")]
    Fee(#[from] FeeError),

    #[error("Broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
}

/// Whether repeating the cycle at the normal cadence can fix the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl CycleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CycleError::Randomness(e) if e.is_permanent() => ErrorClass::Permanent,
            _ => ErrorClass::Transient,
        }
    }
}

/// Errors during startup, before the loop is entered.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Bot registration failed: {0}")]
    Registration(#[from] CycleError),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// The agent can no longer trust its own state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Failed to resynchronize sign data for {address}: {source}")]
    Resync { address: String, source: ChainError },
}
