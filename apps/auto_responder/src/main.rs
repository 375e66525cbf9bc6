// Unattended responder: polls the inbox on a fixed interval and answers
// every unread message that is not spam, until Ctrl-C.

use replyflow::{
    AppConfig, AutoResponder, CredentialStore, EmailClassifier, GmailGateway, PollTriggerBuilder,
    ResponseGenerator, SamplingConfig,
    llm::{ModelFactory, adapters::gemini_model},
    shutdown::CtrlCShutdown,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        interval_secs = config.check_interval.as_secs(),
        fetch_limit = config.fetch_limit,
        model = %config.responder_model,
        "Starting auto-responder"
    );

    let classifier = match EmailClassifier::load_or_seed(&config.model_path, &config.training_data_path).await {
        Ok(classifier) => classifier,
        Err(e) => {
            error!(error = %e, "Failed to prepare the classifier");
            return ExitCode::FAILURE;
        }
    };

    let base_model = match gemini_model(&config.responder_model, &SamplingConfig::default()) {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, "Failed to set up the language model");
            return ExitCode::FAILURE;
        }
    };
    let model = ModelFactory::create(base_model, Some(config.retry_config()));
    let generator = match ResponseGenerator::new(model) {
        Ok(generator) => generator,
        Err(e) => {
            error!(error = %e, "Failed to build the reply prompt");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(CredentialStore::new(config.gconf()));
    let mailbox = GmailGateway::new(store);
    let trigger = PollTriggerBuilder::new("inbox", config.check_interval).build();

    let responder = AutoResponder::new(Box::new(mailbox), classifier, generator)
        .with_fetch_limit(config.fetch_limit)
        .add_trigger(Box::new(trigger))
        .with_shutdown_handler(CtrlCShutdown::new());

    match responder.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Auto-responder failed");
            ExitCode::FAILURE
        }
    }
}
