//! Retry decorator for language models.
//!
//! Rate-limited requests (429) are retried following the configured
//! [`RetryStrategy`](crate::llm::RetryStrategy). When the provider attaches a
//! Google `RetryInfo` hint, the hinted delay replaces the computed one, capped
//! at [`RetryConfig::max_delay`].

use crate::llm::config::RetryConfig;
use crate::llm::core::{LanguageModel, ModelError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps a boxed model with retry logic.
pub struct RetryingModel {
    inner: Box<dyn LanguageModel>,
    config: RetryConfig,
}

impl RetryingModel {
    pub fn new(inner: Box<dyn LanguageModel>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn should_retry(&self, error: &ModelError) -> bool {
        !self.config.only_retry_rate_limits || error.is_rate_limited()
    }

    fn delay_for(&self, error: &ModelError, computed: Duration) -> Duration {
        error
            .retry_delay_hint()
            .map_or(computed, |hint| hint.min(self.config.max_delay))
    }
}

#[async_trait]
impl LanguageModel for RetryingModel {
    async fn prompt(&mut self, text: String) -> Result<String, ModelError> {
        let mut delays = self.config.delays();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let error = match self.inner.prompt(text.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !self.should_retry(&error) {
                debug!(attempt, error = %error, "Model error is not retryable");
                return Err(error);
            }

            let Some(computed) = delays.next() else {
                warn!(attempts = attempt, error = %error, "Giving up on the model after retries");
                return Err(error);
            };

            let delay = self.delay_for(&error, computed);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying model request");
            tokio::time::sleep(delay).await;
        }
    }
}
