//! Aurand Bot - Randomness oracle for the aurand CosmWasm contract
//!
//! An unattended agent that watches the aurand contract for pending
//! randomness commitments, fetches a signed random value from random.org and
//! submits it back in an `add_randomness` execution.
//!
//! # Architecture
//!
//! - **[`SequenceTracker`]**: local account sequence, reset from chain truth
//! - **[`ChainReader`]**: contract queries and chain truth ([`AurandContract`])
//! - **[`RandomnessProvider`]**: signed random integers ([`RandomOrgClient`])
//! - **[`TransactionBuilder`]** / **[`FeePolicy`]**: message and fee
//! - **[`Broadcaster`]**: signs once, races 1-3 endpoints, first success wins
//! - **[`RecoveryManager`]**: logs cycle errors and resyncs the sequence
//! - **[`Oracle`]**: the polling loop tying it all together
//!
//! # Quick Start
//!
//! ```bash
//! # Settings from .env / environment
//! cargo run -p aurand-bot
//!
//! # Settings from a TOML file, with periodic metrics export
//! cargo run -p aurand-bot -- --config chains/aurand-bot/config/aurand.toml --export-metrics metrics.json
//! ```

pub mod broadcast;
pub mod chain;
pub mod config;
pub mod error;
pub mod fee;
pub mod msg;
pub mod oracle;
pub mod randomness;
pub mod recovery;
pub mod registration;
pub mod rpc;
pub mod sequence;
pub mod tx;
pub mod wallet;

pub use broadcast::{BroadcastOutcome, Broadcaster, DeliveredTx, TxResponse, TxSubmitter};
pub use chain::{BotInfo, ChainReader, GasSimulator};
pub use config::{AurandConfig, RawConfig};
pub use error::{
    BroadcastError, ChainError, CycleError, EndpointFailure, ErrorClass, FatalError, FeeError,
    ProviderError, SigningError, StartupError, SubmitError,
};
pub use fee::{calculate_fee, scale_simulated_gas, Fee, FeePolicy, GasPrice};
pub use msg::{ExecuteMsg, QueryMsg};
pub use oracle::{CycleReport, CycleState, Oracle, OracleComponents, OracleSettings};
pub use randomness::{RandomOrgClient, RandomRequest, RandomValue, RandomnessProvider};
pub use recovery::RecoveryManager;
pub use registration::{hash_api_key, Registration};
pub use rpc::{AurandContract, CosmosRpc};
pub use sequence::{SequenceTracker, SignData};
pub use tx::{PendingTransaction, TransactionBuilder, ADD_RANDOMNESS_MEMO};
pub use wallet::{TxSigner, Wallet};
