//! Backoff Policy - Escalating delays for repeated failures
//!
//! Computes the delay before the next attempt after `n` consecutive failures
//! using exponential growth with an upper cap and optional jitter.
//!
//! # Example
//!
//! ```rust
//! use core_logic::BackoffConfig;
//! use std::time::Duration;
//!
//! let backoff = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(300));
//! assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
//! ```

use rand::Rng;
use std::time::Duration;

/// Configuration for escalating delays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for any computed delay
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure (2.0 = double each time)
    pub multiplier: f64,
    /// Whether to add ±25% random jitter
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl BackoffConfig {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after `failures` consecutive failures beyond the first.
    ///
    /// `delay_for(0)` is the base delay; every further failure multiplies it,
    /// capped at `max_delay`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        // powi saturates to infinity for large exponents; min() caps it
        let delay_ms = (base_ms * self.multiplier.powi(failures.min(i32::MAX as u32) as i32))
            .min(max_ms)
            .max(base_ms.min(max_ms));

        let delay_ms = if self.jitter {
            let jitter_range = delay_ms / 4.0;
            if jitter_range > 0.0 {
                let jitter = rand::thread_rng().gen_range(-jitter_range..jitter_range);
                (delay_ms + jitter).max(0.0)
            } else {
                delay_ms
            }
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_exponential_growth() {
        let config = BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(2));

        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
        assert_eq!(config.delay_for(3), Duration::from_millis(800));
        assert_eq!(config.delay_for(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(2));

        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn test_delay_with_jitter_stays_in_range() {
        let config =
            BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(2)).with_jitter(true);

        // Base: 200ms, ±25%
        let delay = config.delay_for(1).as_millis();
        assert!(
            (150..=250).contains(&delay),
            "Delay {} outside expected range",
            delay
        );
    }

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(300));
        assert_eq!(config.multiplier, 2.0);
        assert!(!config.jitter);
    }
}
