//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod backoff;
pub(crate) mod endpoint_health;
pub(crate) mod logger;

pub use backoff::BackoffConfig;
pub use endpoint_health::{RpcEndpoint, RpcHealthStatus, UNHEALTHY_AFTER};
pub use logger::{setup_logger, CYCLE_TARGET};
