use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a [`LanguageModel`].
///
/// Provider errors are carried as the provider's own text, which for Google
/// endpoints is the JSON error envelope. The helpers below read that envelope
/// back when deciding whether a failure is worth retrying.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The provider rejected or failed the request.
    #[error("Failed to prompt the model: {0}")]
    Prompt(String),
    /// The provider answered with nothing usable.
    #[error("The model returned an empty completion")]
    EmptyCompletion,
    /// The model could not be set up.
    #[error("Model configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    /// The JSON error envelope embedded in the provider message, if any.
    fn envelope(&self) -> Option<Value> {
        let ModelError::Prompt(message) = self else {
            return None;
        };
        let start = message.find('{')?;
        serde_json::from_str(&message[start..]).ok()
    }

    /// Whether the provider reported a rate limit (HTTP 429 / `RESOURCE_EXHAUSTED`).
    pub fn is_rate_limited(&self) -> bool {
        match self.envelope() {
            Some(json) => {
                json["error"]["code"].as_i64() == Some(429)
                    || json["error"]["status"].as_str() == Some("RESOURCE_EXHAUSTED")
            }
            None => false,
        }
    }

    /// The `retryDelay` hint of a Google `RetryInfo` detail, if present.
    pub fn retry_delay_hint(&self) -> Option<Duration> {
        let json = self.envelope()?;
        json["error"]["details"]
            .as_array()?
            .iter()
            .filter(|detail| {
                detail["@type"].as_str() == Some("type.googleapis.com/google.rpc.RetryInfo")
            })
            .find_map(|detail| {
                detail["retryDelay"]
                    .as_str()
                    .and_then(|delay| humantime::parse_duration(delay).ok())
            })
    }
}

/// A text-in, text-out generative model.
///
/// The trait requires `Send + Sync` so a boxed model can live inside the
/// control loop and behind the dashboard's mutex.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends a prompt and returns the model's completion.
    async fn prompt(&mut self, text: String) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider_error(body: Value) -> ModelError {
        ModelError::Prompt(format!("ProviderError: {body}"))
    }

    #[test]
    fn detects_rate_limit_inside_provider_text() {
        let err = provider_error(json!({"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn other_codes_are_not_rate_limits() {
        let err = provider_error(json!({"error": {"code": 500, "status": "INTERNAL"}}));
        assert!(!err.is_rate_limited());
        assert!(!ModelError::Prompt("connection reset".to_string()).is_rate_limited());
        assert!(!ModelError::EmptyCompletion.is_rate_limited());
    }

    #[test]
    fn reads_retry_info_hint() {
        let err = provider_error(json!({
            "error": {
                "code": 429,
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.Help"},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "17s"}
                ]
            }
        }));
        assert_eq!(err.retry_delay_hint(), Some(Duration::from_secs(17)));
    }
}
