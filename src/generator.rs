// The `generator` module drafts replies with a generative model.

use crate::llm::{LanguageModel, ModelError};
use crate::utils::{PromptTemplate, TemplateError};
use rig::providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Sent when no usable draft can be produced.
pub const FALLBACK_REPLY: &str = "Thank you for your email. I'll get back to you soon.";

/// The prompt ends with this marker; the reply is whatever follows it.
pub const RESPONSE_MARKER: &str = "Professional response:";

pub const PROMPT_TEMPLATE: &str = "You are a professional email assistant. Respond to this email in a polite and concise manner:\n\nOriginal email:\n{{original_email}}\n\nProfessional response:";

/// Sampling parameters applied to the generative model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: f64,
    /// Values above 1.0 discourage repetition. Providers without a
    /// repetition penalty receive `penalty - 1.0` as a frequency penalty.
    pub repetition_penalty: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.1,
        }
    }
}

impl SamplingConfig {
    /// `None` when the penalty is neutral, so models without penalty
    /// support still accept the request.
    pub fn frequency_penalty(&self) -> Option<f64> {
        let penalty = self.repetition_penalty - 1.0;
        (penalty.abs() > f64::EPSILON).then_some(penalty)
    }

    /// Generation settings for a Gemini agent's `additional_params`.
    pub fn gemini_params(&self) -> AdditionalParameters {
        let gen_cfg = GenerationConfig {
            temperature: Some(self.temperature),
            max_output_tokens: Some(self.max_tokens),
            top_p: Some(self.top_p),
            frequency_penalty: self.frequency_penalty(),
            candidate_count: Some(1),
            ..Default::default()
        };
        AdditionalParameters::default().with_config(gen_cfg)
    }
}

#[derive(Serialize)]
struct PromptContext<'a> {
    original_email: &'a str,
}

pub struct ResponseGenerator {
    model: Box<dyn LanguageModel>,
    template: PromptTemplate,
}

impl ResponseGenerator {
    pub fn new(model: Box<dyn LanguageModel>) -> Result<Self, TemplateError> {
        Ok(Self {
            model,
            template: PromptTemplate::new("reply", PROMPT_TEMPLATE)?,
        })
    }

    /// Drafts a reply to `original_body`. Never fails: any problem yields
    /// [`FALLBACK_REPLY`].
    pub async fn generate(&mut self, original_body: &str) -> String {
        if original_body.trim().is_empty() {
            debug!("Empty message body, using fallback reply");
            return FALLBACK_REPLY.to_string();
        }

        match self.draft(original_body).await {
            Ok(reply) => {
                info!(chars = reply.len(), "Generated reply");
                reply
            }
            Err(e) => {
                warn!(error = %e, "Reply generation failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn draft(&mut self, original_body: &str) -> Result<String, GenerateError> {
        let prompt = self.template.render(&PromptContext {
            original_email: original_body,
        })?;
        let output = self.model.prompt(prompt).await?;
        extract_reply(&output).ok_or(GenerateError::Model(ModelError::EmptyCompletion))
    }
}

#[derive(thiserror::Error, Debug)]
enum GenerateError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Text after the last [`RESPONSE_MARKER`], or the whole output when nothing
/// follows it. `None` when the output is blank.
pub fn extract_reply(output: &str) -> Option<String> {
    let after_marker = output
        .rfind(RESPONSE_MARKER)
        .map(|pos| output[pos + RESPONSE_MARKER.len()..].trim())
        .filter(|reply| !reply.is_empty());

    let reply = after_marker.unwrap_or_else(|| output.trim());
    (!reply.is_empty()).then(|| reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct ScriptedModel {
        reply: Result<String, String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        fn boxed(reply: Result<&str, &str>) -> (Box<dyn LanguageModel>, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            let model = ScriptedModel {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: prompts.clone(),
            };
            (Box::new(model), prompts)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn prompt(&mut self, text: String) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(text);
            self.reply.clone().map_err(ModelError::Prompt)
        }
    }

    #[tokio::test]
    async fn prompt_wraps_the_original_body() {
        let (model, prompts) = ScriptedModel::boxed(Ok("Sure, see you then."));
        let mut generator = ResponseGenerator::new(model).unwrap();

        let reply = generator.generate("Can we meet <Friday>?").await;

        assert_eq!(reply, "Sure, see you then.");
        let prompts = prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "You are a professional email assistant. Respond to this email in a polite and concise manner:\n\nOriginal email:\nCan we meet <Friday>?\n\nProfessional response:"
        );
    }

    #[tokio::test]
    async fn model_failure_falls_back() {
        let (model, _) = ScriptedModel::boxed(Err("service unavailable"));
        let mut generator = ResponseGenerator::new(model).unwrap();

        assert_eq!(generator.generate("Hello there").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn blank_body_skips_the_model() {
        let (model, prompts) = ScriptedModel::boxed(Ok("unused"));
        let mut generator = ResponseGenerator::new(model).unwrap();

        assert_eq!(generator.generate("  \n ").await, FALLBACK_REPLY);
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_completion_falls_back() {
        let (model, _) = ScriptedModel::boxed(Ok("   "));
        let mut generator = ResponseGenerator::new(model).unwrap();

        assert_eq!(generator.generate("Hello there").await, FALLBACK_REPLY);
    }

    #[test]
    fn echoed_prompt_is_cut_at_the_last_marker() {
        let output = "Original email:\nhi\n\nProfessional response:\n  Thanks, noted.  ";
        assert_eq!(extract_reply(output).as_deref(), Some("Thanks, noted."));
    }

    #[test]
    fn nothing_after_marker_keeps_whole_output() {
        assert_eq!(
            extract_reply("Happy to help. Professional response:").as_deref(),
            Some("Happy to help. Professional response:")
        );
        assert_eq!(extract_reply(""), None);
    }

    #[test]
    fn sampling_maps_repetition_penalty() {
        let sampling = SamplingConfig::default();
        assert!((sampling.frequency_penalty().unwrap() - 0.1).abs() < 1e-9);

        let params = serde_json::to_value(sampling.gemini_params()).unwrap();
        assert_eq!(params["generationConfig"]["topP"], 0.9);
        assert_eq!(params["generationConfig"]["maxOutputTokens"], 150);
    }

    #[test]
    fn neutral_penalty_is_not_sent() {
        let sampling = SamplingConfig {
            repetition_penalty: 1.0,
            ..SamplingConfig::default()
        };
        assert_eq!(sampling.frequency_penalty(), None);

        let params = serde_json::to_value(sampling.gemini_params()).unwrap();
        assert!(params["generationConfig"].get("frequencyPenalty").is_none());
    }
}
