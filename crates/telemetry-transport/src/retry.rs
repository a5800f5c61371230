//! # Retry Policy Module
//!
//! Exponential backoff for queued items whose delivery failed transiently.
//!
//! The delay before the n-th retry is `base_delay * 2^(n-1)`, capped at
//! `max_delay`. Jitter is optional and off by default.

use rand::Rng;
use std::time::Duration;

use crate::config::TransportConfig;

/// Retry policy configuration for exponential backoff
///
/// # Examples
///
/// ```rust
/// use telemetry_transport::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(60));
///
/// assert_eq!(policy.calculate_delay(1), Duration::from_secs(1));
/// assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries before an item is discarded
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any computed delay
    pub max_delay: Duration,

    /// Whether to randomize delays
    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (0.25 = ±25%)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            use_jitter: false,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy without jitter
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            use_jitter: false,
            jitter_percent: 0.25,
        }
    }

    /// Build the policy described by a transport configuration
    pub fn from_config(config: &TransportConfig) -> Self {
        let policy = Self::new(
            config.max_retries,
            config.retry_base_delay(),
            config.max_retry_delay(),
        );

        if config.retry_jitter {
            policy.with_jitter()
        } else {
            policy
        }
    }

    /// Enable ±25% randomization of delays
    pub fn with_jitter(mut self) -> Self {
        self.use_jitter = true;
        self
    }

    /// Set custom jitter percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Calculate the delay before retry number `retry_count`
    ///
    /// `retry_count` is 1-based: the first retry waits `base_delay`. A count
    /// of zero means the item has not failed yet and yields no delay.
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }

        let exponent = (retry_count - 1).min(63) as i32;
        let base_secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.use_jitter {
            Self::add_jitter(capped_secs, self.jitter_percent).min(self.max_delay.as_secs_f64())
        } else {
            capped_secs
        };

        Duration::from_secs_f64(final_secs)
    }

    /// Delay for a retry, honouring a server-supplied `Retry-After`
    ///
    /// A server hint replaces the computed backoff but is still capped.
    pub fn delay_for(&self, retry_count: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.calculate_delay(retry_count),
        }
    }

    /// Check whether an item with this retry count may be retried again
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count <= self.max_retries
    }

    /// Check whether an item has used up its retries
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        !self.should_retry(retry_count)
    }

    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
