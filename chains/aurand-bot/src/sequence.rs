//! Sequence Tracker - Local account sequence for transaction signing
//!
//! Every transaction from the bot account must carry the sequence number the
//! chain expects next. Querying it before each transaction costs a round trip,
//! so the tracker hands out sequences from memory and is only resynchronized
//! with chain truth at startup and after a failed cycle.
//!
//! # Example
//!
//! ```rust
//! use aurand_bot::{SequenceTracker, SignData};
//!
//! let mut tracker = SequenceTracker::new(SignData::new("aura-testnet-2", 7, 41));
//!
//! assert_eq!(tracker.next().sequence, 41);
//! assert_eq!(tracker.next().sequence, 42);
//!
//! // Chain truth wins after an error
//! tracker.reset(SignData::new("aura-testnet-2", 7, 41));
//! assert_eq!(tracker.current().sequence, 41);
//! ```

use serde::Serialize;
use std::fmt;

/// Everything besides the keys that goes into a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignData {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
}

impl SignData {
    pub fn new(chain_id: impl Into<String>, account_number: u64, sequence: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            account_number,
            sequence,
        }
    }
}

impl fmt::Display for SignData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{chainId: {}, accountNumber: {}, sequence: {}}}",
            self.chain_id, self.account_number, self.sequence
        )
    }
}

/// Owned by the loop driver. No interior locking: there is exactly one
/// writer and it never shares the tracker across tasks.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    /// Sign data for the NEXT transaction
    next: SignData,
}

impl SequenceTracker {
    pub fn new(initial: SignData) -> Self {
        Self { next: initial }
    }

    /// Sign data the next transaction would use, without consuming it.
    ///
    /// Gas simulation signs with this value; the sequence only advances once
    /// a transaction is actually signed for broadcast.
    pub fn current(&self) -> &SignData {
        &self.next
    }

    /// Hands out the current sign data and advances the sequence by one.
    ///
    /// The increment is optimistic: if the transaction never lands, the
    /// caller must [`reset`](Self::reset) from chain truth.
    pub fn next(&mut self) -> SignData {
        let out = self.next.clone();
        self.next.sequence += 1;
        out
    }

    /// Authoritative overwrite from chain truth
    pub fn reset(&mut self, truth: SignData) {
        self.next = truth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_returns_consecutive_sequences() {
        let mut tracker = SequenceTracker::new(SignData::new("aura-testnet-2", 12, 100));

        let handed_out: Vec<u64> = (0..5).map(|_| tracker.next().sequence).collect();
        assert_eq!(handed_out, vec![100, 101, 102, 103, 104]);
        assert_eq!(tracker.current().sequence, 105);
    }

    #[test]
    fn test_next_keeps_chain_and_account() {
        let mut tracker = SequenceTracker::new(SignData::new("euphoria-2", 3, 0));
        let data = tracker.next();
        assert_eq!(data.chain_id, "euphoria-2");
        assert_eq!(data.account_number, 3);
    }

    #[test]
    fn test_reset_overrides_optimistic_increments() {
        let mut tracker = SequenceTracker::new(SignData::new("euphoria-2", 3, 10));
        tracker.next();
        tracker.next();

        tracker.reset(SignData::new("euphoria-2", 3, 11));
        assert_eq!(tracker.next(), SignData::new("euphoria-2", 3, 11));
        assert_eq!(tracker.next().sequence, 12);
    }

    #[test]
    fn test_current_does_not_advance() {
        let tracker = SequenceTracker::new(SignData::new("euphoria-2", 3, 10));
        assert_eq!(tracker.current().sequence, 10);
        assert_eq!(tracker.current().sequence, 10);
    }

    #[test]
    fn test_display_matches_log_format() {
        let data = SignData::new("euphoria-2", 3, 10);
        assert_eq!(
            data.to_string(),
            "{chainId: euphoria-2, accountNumber: 3, sequence: 10}"
        );
    }
}
