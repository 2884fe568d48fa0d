//! # Core Logic - Endpoint Health
//!
//! Bookkeeping for a fixed set of RPC endpoints: per-endpoint success and
//! failure counters, last latency and last error. Broadcast tasks record
//! their outcome here whether or not they won the race, so the operator can
//! see which endpoint is misbehaving.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Consecutive failures after which an endpoint is reported as unhealthy.
pub const UNHEALTHY_AFTER: u64 = 3;

/// RPC endpoint information
#[derive(Debug)]
pub struct RpcEndpoint {
    pub label: String,
    pub url: String,
    last_latency_ms: AtomicU64,
    consecutive_failures: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    healthy: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl RpcEndpoint {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            last_latency_ms: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            last_error: Mutex::new(None),
        }
    }

    pub fn latency_ms(&self) -> u64 {
        self.last_latency_ms.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.total_failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u64 {
        self.total_successes.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Record a successful request
    pub fn record_success(&self, latency: Duration) {
        self.last_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self.total_successes.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
    }

    /// Record a failed request
    pub fn record_failure(&self, latency: Duration, error: &str) {
        self.last_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error.to_string());
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= UNHEALTHY_AFTER && self.healthy.swap(false, Ordering::SeqCst) {
            warn!(
                endpoint = %self.label,
                url = %self.url,
                failures,
                "Marking endpoint as unhealthy"
            );
        }
    }

    pub fn status(&self) -> RpcHealthStatus {
        RpcHealthStatus {
            label: self.label.clone(),
            url: self.url.clone(),
            latency_ms: self.latency_ms(),
            healthy: self.is_healthy(),
            success_count: self.successes(),
            failure_count: self.failures(),
            last_error: self.last_error(),
        }
    }
}

/// Health status of an RPC endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RpcHealthStatus {
    pub label: String,
    pub url: String,
    pub latency_ms: u64,
    pub healthy: bool,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success_resets_streak() {
        let endpoint = RpcEndpoint::new("primary", "http://a:26657");
        endpoint.record_failure(Duration::from_millis(5), "timeout");
        endpoint.record_failure(Duration::from_millis(5), "timeout");
        endpoint.record_success(Duration::from_millis(12));

        let status = endpoint.status();
        assert!(status.healthy);
        assert_eq!(status.success_count, 1);
        assert_eq!(status.failure_count, 2);
        assert_eq!(status.latency_ms, 12);
        assert_eq!(status.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_unhealthy_after_consecutive_failures() {
        let endpoint = RpcEndpoint::new("secondary-1", "http://b:26657");
        for _ in 0..UNHEALTHY_AFTER {
            endpoint.record_failure(Duration::ZERO, "connection refused");
        }
        assert!(!endpoint.is_healthy());

        endpoint.record_success(Duration::ZERO);
        assert!(endpoint.is_healthy());
    }
}
