use crate::llm::config::RetryConfig;
use crate::llm::core::LanguageModel;
use crate::llm::decorators::RetryingModel;

/// Builds the model handed to the response generator, wrapping the base
/// model with retry logic when the configuration asks for it.
pub struct ModelFactory;

impl ModelFactory {
    /// Wraps `base` in a [`RetryingModel`] unless `retry_config` is `None`
    /// or allows zero retries.
    pub fn create(
        base: Box<dyn LanguageModel>,
        retry_config: Option<RetryConfig>,
    ) -> Box<dyn LanguageModel> {
        match retry_config {
            Some(config) if config.max_attempts > 0 => {
                tracing::debug!(
                    max_attempts = config.max_attempts,
                    base_delay_ms = config.base_delay.as_millis() as u64,
                    strategy = ?config.strategy,
                    only_rate_limits = config.only_retry_rate_limits,
                    "Wrapping model with retry decorator"
                );
                Box::new(RetryingModel::new(base, config))
            }
            _ => {
                tracing::debug!("Using model without retry");
                base
            }
        }
    }
}
