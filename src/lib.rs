//! # replyflow: an email auto-responder.
//!
//! Unread Gmail messages are normalized, classified and, unless they are
//! spam, answered with a reply drafted by a generative model.

/// The `agent` module runs the unattended poll, classify and reply loop.
pub mod agent;
/// The `classifier` module learns labels from sample emails.
pub mod classifier;
/// The `config` module reads the settings shared by both binaries.
pub mod config;
/// The `dashboard` module exposes the pipeline for interactive review.
pub mod dashboard;
/// The `generator` module drafts replies with a language model.
pub mod generator;
/// The `llm` module provides a trait for interacting with language models.
pub mod llm;
pub mod mailbox;
pub mod normalizer;
/// The `shutdown` module provides a trait for gracefully shutting down the responder.
pub mod shutdown;
/// The `triggers` module schedules poll cycles.
pub mod triggers;
pub mod utils;

pub use agent::{AgentError, AutoResponder, BatchReport, MessageOutcome};
pub use classifier::{ClassifierError, EmailClassifier, Evaluation, Label, TrainingSample, TrainingSet};
pub use config::{AppConfig, ConfigError};
pub use dashboard::{Dashboard, DashboardError};
pub use generator::{ResponseGenerator, SamplingConfig};
pub use mailbox::{GmailGateway, Mailbox, MailboxError, Message, MessageRef, OutgoingReply};
pub use triggers::{PollTrigger, PollTriggerBuilder};
pub use utils::CredentialStore;
