// The `config` module gathers the externally supplied settings of the responder.

use crate::llm::RetryConfig;
use crate::utils::google_auth::GConf;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default poll interval in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
/// Default number of unread messages fetched per poll cycle.
pub const DEFAULT_FETCH_LIMIT: u32 = 5;
/// Default generative model.
pub const DEFAULT_RESPONDER_MODEL: &str = "gemini-2.0-flash-lite";

/// The `ConfigError` enum defines the possible errors while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable was set but its value could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings shared by the auto-responder and the dashboard.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Provider-issued client registration (`CREDS_FILE`).
    pub credentials_path: PathBuf,
    /// Persisted OAuth token (`TOKEN_FILE`).
    pub token_path: PathBuf,
    /// Time between two poll cycles (`CHECK_INTERVAL`, seconds).
    pub check_interval: Duration,
    /// Unread messages fetched per cycle (`FETCH_LIMIT`).
    pub fetch_limit: u32,
    /// Serialized classifier state (`MODEL_PATH`).
    pub model_path: PathBuf,
    /// Where uploaded training data is written (`TRAINING_DATA_PATH`).
    pub training_data_path: PathBuf,
    /// Generative model name (`RESPONDER_MODEL`).
    pub responder_model: String,
    /// Rate-limit retries for the generative model (`LLM_RETRY_ATTEMPTS`).
    pub llm_retry_attempts: usize,
    /// Dashboard bind address (`DASHBOARD_ADDR`).
    pub dashboard_addr: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            model_path: PathBuf::from("models/email_classifier.json"),
            training_data_path: PathBuf::from("training_data/sample_emails.csv"),
            responder_model: DEFAULT_RESPONDER_MODEL.to_string(),
            llm_retry_attempts: RetryConfig::default().max_attempts,
            dashboard_addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment, loading a `.env`
    /// file first when one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut conf = Self::default();

        if let Some(path) = lookup("CREDS_FILE") {
            conf.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TOKEN_FILE") {
            conf.token_path = PathBuf::from(path);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CHECK_INTERVAL")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "CHECK_INTERVAL",
                    value: secs.to_string(),
                });
            }
            conf.check_interval = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var(&lookup, "FETCH_LIMIT")? {
            conf.fetch_limit = limit;
        }
        if let Some(path) = lookup("MODEL_PATH") {
            conf.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TRAINING_DATA_PATH") {
            conf.training_data_path = PathBuf::from(path);
        }
        if let Some(model) = lookup("RESPONDER_MODEL") {
            conf.responder_model = model;
        }
        if let Some(attempts) = parse_var(&lookup, "LLM_RETRY_ATTEMPTS")? {
            conf.llm_retry_attempts = attempts;
        }
        if let Some(addr) = parse_var(&lookup, "DASHBOARD_ADDR")? {
            conf.dashboard_addr = addr;
        }

        Ok(conf)
    }

    /// The Google authentication settings derived from this configuration.
    pub fn gconf(&self) -> GConf {
        GConf::new(self.credentials_path.clone(), self.token_path.clone())
    }

    /// Retry behaviour for the generative model.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.llm_retry_attempts,
            ..RetryConfig::default()
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
