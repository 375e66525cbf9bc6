use crate::generator::SamplingConfig;
use crate::llm::core::{LanguageModel, ModelError};
use async_trait::async_trait;
use rig::{
    agent::Agent as RigAgent, client::CompletionClient, completion::CompletionModel,
    prelude::ProviderClient, providers::gemini,
};
use tracing::{debug, info};

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Lets any `rig::Agent` serve as the responder's [`LanguageModel`].
///
/// Any other rig provider works the same way as [`gemini_model`]:
///
/// ```rust,ignore
/// let agent = openai::Client::from_env().agent("gpt-4o-mini").build();
/// let model: Box<dyn LanguageModel> = Box::new(agent);
/// ```
#[async_trait]
impl<M> LanguageModel for RigAgent<M>
where
    M: CompletionModel,
{
    async fn prompt(&mut self, text: String) -> Result<String, ModelError> {
        rig::completion::Prompt::prompt(self, text)
            .await
            .map(|response| response.to_string())
            .map_err(|e| {
                debug!(error = %e, "Rig agent error");
                ModelError::Prompt(e.to_string())
            })
    }
}

/// Builds a Gemini agent for `model` with the given sampling parameters.
pub fn gemini_model(model: &str, sampling: &SamplingConfig) -> Result<Box<dyn LanguageModel>, ModelError> {
    if std::env::var(GEMINI_API_KEY).map_or(true, |key| key.trim().is_empty()) {
        return Err(ModelError::Configuration(format!("{GEMINI_API_KEY} is not set")));
    }

    let params = serde_json::to_value(sampling.gemini_params())
        .map_err(|e| ModelError::Configuration(format!("Invalid generation config: {e}")))?;

    let agent = gemini::Client::from_env()
        .agent(model)
        .temperature(sampling.temperature)
        .max_tokens(sampling.max_tokens)
        .additional_params(params)
        .build();
    info!(model, temperature = sampling.temperature, max_tokens = sampling.max_tokens, "Gemini model ready");
    Ok(Box::new(agent))
}
