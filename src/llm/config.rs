use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval, jitter};

/// Configuration for retrying the generative model.
///
/// Providers answer bursts of replies with 429s; a short backoff is usually
/// enough to get the draft through on the same poll cycle.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first one (0 means no retries).
    pub max_attempts: usize,
    /// Base delay of the backoff.
    pub base_delay: Duration,
    /// Upper bound for a single wait.
    pub max_delay: Duration,
    /// How the wait grows between attempts.
    pub strategy: RetryStrategy,
    /// Only retry rate-limit (429) errors.
    pub only_retry_rate_limits: bool,
}

/// Retry strategy for failed model requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles on every retry.
    ExponentialBackoff,
    /// Doubling delay, randomly shortened.
    ExponentialBackoffWithJitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            strategy: RetryStrategy::ExponentialBackoffWithJitter,
            only_retry_rate_limits: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: usize, base_delay: Duration, strategy: RetryStrategy) -> Self {
        Self {
            max_attempts,
            base_delay,
            strategy,
            ..Self::default()
        }
    }

    /// Retry every error, not just rate limits.
    pub fn retry_all_errors(mut self) -> Self {
        self.only_retry_rate_limits = false;
        self
    }

    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::ZERO,
            strategy: RetryStrategy::Fixed,
            ..Self::default()
        }
    }

    /// The waits between attempts, one per retry.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_delay = self.max_delay;
        let take = self.max_attempts;

        // `ExponentialBackoff` raises its base to successive powers, so start
        // from 2 and scale by half the base delay to get base * 2^n.
        let doubling = ExponentialBackoff::from_millis(2)
            .factor((base_ms / 2).max(1))
            .max_delay(max_delay);

        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedInterval::from_millis(base_ms).take(take)),
            RetryStrategy::ExponentialBackoff => Box::new(doubling.take(take)),
            RetryStrategy::ExponentialBackoffWithJitter => {
                Box::new(doubling.map(jitter).take(take))
            }
        }
    }
}
