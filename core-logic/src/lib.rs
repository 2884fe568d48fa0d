//! # Core Logic - Shared Utilities for the Aurand Oracle
//!
//! This crate provides the chain-agnostic pieces used by the oracle bot.
//!
//! ## Modules
//!
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Cycle and broadcast metrics collection
//! - `utils` - Logger setup, backoff policy, endpoint health tracking

pub mod error;
pub mod metrics;
pub(crate) mod utils;

pub use error::{ConfigError, NetworkError, WalletError};
pub use metrics::{MetricsCollector, MetricsSnapshot};

pub use utils::{
    setup_logger, BackoffConfig, RpcEndpoint, RpcHealthStatus, CYCLE_TARGET, UNHEALTHY_AFTER,
};
