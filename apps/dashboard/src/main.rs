// Interactive dashboard: serves the review endpoints on DASHBOARD_ADDR.

use replyflow::{
    AppConfig, CredentialStore, Dashboard, EmailClassifier, GmailGateway, ResponseGenerator,
    SamplingConfig,
    dashboard::router,
    llm::{ModelFactory, adapters::gemini_model},
    shutdown::{self, CtrlCShutdown},
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Mutex;
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

    let classifier = match EmailClassifier::load_or_seed(&config.model_path, &config.training_data_path).await {
        Ok(classifier) => classifier,
        Err(e) => {
            error!(error = %e, "Failed to prepare the classifier");
            return ExitCode::FAILURE;
        }
    };

    let generator = match gemini_model(&config.responder_model, &SamplingConfig::default())
        .map(|base| ModelFactory::create(base, Some(config.retry_config())))
    {
        Ok(model) => match ResponseGenerator::new(model) {
            Ok(generator) => generator,
            Err(e) => {
                error!(error = %e, "Failed to build the reply prompt");
                return ExitCode::FAILURE;
            }
        },
        Err(e) => {
            error!(error = %e, "Failed to set up the language model");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(CredentialStore::new(config.gconf()));
    let dashboard = Dashboard::new(
        Box::new(GmailGateway::new(store)),
        classifier,
        generator,
        config.training_data_path.clone(),
    );
    let app = router(Arc::new(Mutex::new(dashboard)));

    let listener = match tokio::net::TcpListener::bind(config.dashboard_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.dashboard_addr, error = %e, "Failed to bind dashboard address");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.dashboard_addr, "Dashboard listening");

    match axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal(CtrlCShutdown::new()))
        .await
    {
        Ok(()) => {
            info!("Dashboard stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Dashboard server failed");
            ExitCode::FAILURE
        }
    }
}
