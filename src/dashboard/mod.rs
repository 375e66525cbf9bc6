//! Interactive review of the inbox.
//!
//! [`Dashboard`] runs the responder's steps one at a time on an operator's
//! request: authenticate, fetch and classify unread mail with a suggested
//! reply, send an edited reply, upload training data and retrain.
//! [`routes::router`] exposes these operations over HTTP.

pub mod routes;

use crate::classifier::{ClassifierError, EmailClassifier, Label, TrainingSet};
use crate::generator::ResponseGenerator;
use crate::mailbox::{Mailbox, MailboxError, Message, OutgoingReply};
use crate::normalizer::normalize;
use crate::utils::google_auth::AuthError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub use routes::router;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Not authenticated, call authenticate first")]
    NotAuthenticated,
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
    #[error("Unknown message {0}, fetch it first")]
    UnknownMessage(String),
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An unread message with its classification and, for non-spam, a draft.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub message: Message,
    /// `None` when the message could not be classified.
    pub label: Option<Label>,
    pub suggested_reply: Option<String>,
}

/// Where the training data for [`Dashboard::retrain`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingSource {
    Uploaded,
    Seed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainSummary {
    pub samples: usize,
    pub source: TrainingSource,
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub authenticated: bool,
    pub trained: bool,
    pub labels: Vec<Label>,
    pub pending_review: usize,
}

pub struct Dashboard {
    mailbox: Box<dyn Mailbox>,
    classifier: EmailClassifier,
    generator: ResponseGenerator,
    training_data_path: PathBuf,
    authenticated: bool,
    fetched: HashMap<String, Message>,
}

impl Dashboard {
    pub fn new(
        mailbox: Box<dyn Mailbox>,
        classifier: EmailClassifier,
        generator: ResponseGenerator,
        training_data_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            generator,
            training_data_path: training_data_path.into(),
            authenticated: false,
            fetched: HashMap::new(),
        }
    }

    pub fn status(&self) -> Status {
        Status {
            authenticated: self.authenticated,
            trained: self.classifier.is_trained(),
            labels: self.classifier.labels().to_vec(),
            pending_review: self.fetched.len(),
        }
    }

    pub async fn authenticate(&mut self) -> Result<(), DashboardError> {
        match self.mailbox.authenticate().await {
            Ok(()) => {
                self.authenticated = true;
                info!("Dashboard authenticated");
                Ok(())
            }
            Err(e) => {
                self.authenticated = false;
                Err(e.into())
            }
        }
    }

    /// Lists up to `limit` unread messages, classifies each and drafts a
    /// reply for everything that is not spam. Messages that cannot be
    /// fetched are left out. The result replaces the previous review set.
    pub async fn fetch_and_classify(&mut self, limit: u32) -> Result<Vec<ReviewItem>, DashboardError> {
        if !self.authenticated {
            return Err(DashboardError::NotAuthenticated);
        }

        let refs = self.mailbox.list_unread(limit).await?;
        self.fetched.clear();
        let mut items = Vec::with_capacity(refs.len());

        for message_ref in &refs {
            let message = match self.mailbox.fetch_full(message_ref).await {
                Ok(message) => message,
                Err(e) => {
                    warn!(message_id = %message_ref.id, error = %e, "Skipping message that could not be fetched");
                    continue;
                }
            };

            let label = match self.classifier.predict(&normalize(&message.body)) {
                Ok(label) => Some(label),
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Message left unclassified");
                    None
                }
            };

            let suggested_reply = match &label {
                Some(label) if label.is_spam() => None,
                _ => Some(self.generator.generate(&message.body).await),
            };

            self.fetched.insert(message.id.clone(), message.clone());
            items.push(ReviewItem {
                message,
                label,
                suggested_reply,
            });
        }

        info!(count = items.len(), "Fetched messages for review");
        Ok(items)
    }

    /// Sends `body` as the reply to a previously fetched message and marks
    /// it read when the send succeeds. A failed send may have discarded the
    /// credential, so the dashboard asks to authenticate again.
    pub async fn send_reply(&mut self, message_id: &str, body: &str) -> Result<bool, DashboardError> {
        let message = self
            .fetched
            .get(message_id)
            .ok_or_else(|| DashboardError::UnknownMessage(message_id.to_string()))?;

        let reply = OutgoingReply::reply_to(message, body);
        if !self.mailbox.send(&reply).await {
            self.authenticated = false;
            return Ok(false);
        }

        let reference = message.reference();
        if !self.mailbox.mark_read(&reference).await {
            warn!(message_id, "Reply sent but message could not be marked read");
        }
        self.fetched.remove(message_id);
        Ok(true)
    }

    /// Stores an uploaded CSV verbatim for the next retrain.
    pub async fn upload_training_data(&self, bytes: &[u8]) -> Result<PathBuf, DashboardError> {
        if let Some(parent) = self.training_data_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.training_data_path, bytes).await?;
        info!(path = %self.training_data_path.display(), bytes = bytes.len(), "Training data uploaded");
        Ok(self.training_data_path.clone())
    }

    /// Retrains on the uploaded data when it exists and parses, otherwise on
    /// the built-in seed set.
    pub async fn retrain(&mut self) -> Result<RetrainSummary, DashboardError> {
        let (set, source) = match load_uploaded(&self.training_data_path).await {
            Some(set) => (set, TrainingSource::Uploaded),
            None => (TrainingSet::seed(), TrainingSource::Seed),
        };

        self.classifier.train_on(&set.map_texts(normalize)).await?;

        Ok(RetrainSummary {
            samples: set.len(),
            source,
            labels: self.classifier.labels().to_vec(),
        })
    }
}

async fn load_uploaded(path: &Path) -> Option<TrainingSet> {
    if !path.exists() {
        return None;
    }
    match TrainingSet::load_csv(path).await {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Uploaded training data unusable, using seed set");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::{LanguageModel, ModelError};
    use crate::mailbox::MessageRef;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    pub(crate) struct Recorded {
        pub sent: Vec<OutgoingReply>,
        pub read: Vec<String>,
    }

    pub(crate) struct StubMailbox {
        pub inbox: Vec<Message>,
        pub recorded: Arc<Mutex<Recorded>>,
        pub send_ok: bool,
    }

    #[async_trait]
    impl Mailbox for StubMailbox {
        async fn authenticate(&self) -> Result<(), AuthError> {
            Ok(())
        }

        async fn list_unread(&self, limit: u32) -> Result<Vec<MessageRef>, MailboxError> {
            Ok(self.inbox.iter().take(limit as usize).map(Message::reference).collect())
        }

        async fn fetch_full(&self, message: &MessageRef) -> Result<Message, MailboxError> {
            self.inbox
                .iter()
                .find(|m| m.id == message.id)
                .cloned()
                .ok_or_else(|| MailboxError::NotFound(message.id.clone()))
        }

        async fn send(&self, reply: &OutgoingReply) -> bool {
            if self.send_ok {
                self.recorded.lock().unwrap().sent.push(reply.clone());
            }
            self.send_ok
        }

        async fn mark_read(&self, message: &MessageRef) -> bool {
            self.recorded.lock().unwrap().read.push(message.id.clone());
            true
        }
    }

    struct CannedModel;

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn prompt(&mut self, _text: String) -> Result<String, ModelError> {
            Ok("Thanks for reaching out.".to_string())
        }
    }

    pub(crate) fn inbox_message(id: &str, body: &str) -> Message {
        Message {
            id: id.to_string(),
            thread_id: None,
            from: "Sam <sam@example.com>".to_string(),
            subject: "Hello".to_string(),
            snippet: body.chars().take(20).collect(),
            body: body.to_string(),
            message_id_header: None,
            is_read: false,
        }
    }

    pub(crate) async fn dashboard(dir: &TempDir, inbox: Vec<Message>) -> (Dashboard, Arc<Mutex<Recorded>>) {
        dashboard_with(dir, inbox, true).await
    }

    async fn dashboard_with(dir: &TempDir, inbox: Vec<Message>, send_ok: bool) -> (Dashboard, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mailbox = StubMailbox {
            inbox,
            recorded: recorded.clone(),
            send_ok,
        };
        let dashboard = Dashboard::new(
            Box::new(mailbox),
            EmailClassifier::load_or_new(dir.path().join("model.json")).await,
            ResponseGenerator::new(Box::new(CannedModel)).unwrap(),
            dir.path().join("training/upload.csv"),
        );
        (dashboard, recorded)
    }

    #[tokio::test]
    async fn fetch_requires_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(&dir, vec![]).await;

        assert!(matches!(
            dashboard.fetch_and_classify(5).await,
            Err(DashboardError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn review_items_carry_label_and_draft() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(
            &dir,
            vec![inbox_message("m1", "hi friend"), inbox_message("m2", "free money click here")],
        )
        .await;
        dashboard.retrain().await.unwrap();
        dashboard.authenticate().await.unwrap();

        let items = dashboard.fetch_and_classify(5).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label.as_ref().map(Label::as_str), Some("personal"));
        assert_eq!(items[0].suggested_reply.as_deref(), Some("Thanks for reaching out."));
        assert!(items[1].label.as_ref().is_some_and(Label::is_spam));
        assert_eq!(items[1].suggested_reply, None);
    }

    #[tokio::test]
    async fn untrained_classifier_still_lists_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(&dir, vec![inbox_message("m1", "hi friend")]).await;
        dashboard.authenticate().await.unwrap();

        let items = dashboard.fetch_and_classify(5).await.unwrap();

        assert_eq!(items[0].label, None);
        assert!(items[0].suggested_reply.is_some());
    }

    #[tokio::test]
    async fn sending_marks_read_and_forgets_the_message() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, recorded) = dashboard(&dir, vec![inbox_message("m1", "hi friend")]).await;
        dashboard.authenticate().await.unwrap();
        dashboard.fetch_and_classify(5).await.unwrap();

        assert!(dashboard.send_reply("m1", "Edited reply").await.unwrap());

        {
            let recorded = recorded.lock().unwrap();
            assert_eq!(recorded.sent[0].body, "Edited reply");
            assert_eq!(recorded.sent[0].to, "sam@example.com");
            assert_eq!(recorded.read, vec!["m1".to_string()]);
        }
        assert!(matches!(
            dashboard.send_reply("m1", "again").await,
            Err(DashboardError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn failed_send_requires_authenticating_again() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, recorded) = dashboard_with(&dir, vec![inbox_message("m1", "hi friend")], false).await;
        dashboard.authenticate().await.unwrap();
        dashboard.fetch_and_classify(5).await.unwrap();

        assert!(!dashboard.send_reply("m1", "Edited reply").await.unwrap());

        assert!(recorded.lock().unwrap().read.is_empty());
        assert!(!dashboard.status().authenticated);
        assert_eq!(dashboard.status().pending_review, 1);
        assert!(matches!(
            dashboard.fetch_and_classify(5).await,
            Err(DashboardError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn each_fetch_replaces_the_review_set() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(
            &dir,
            vec![inbox_message("m1", "hi friend"), inbox_message("m2", "project status update")],
        )
        .await;
        dashboard.authenticate().await.unwrap();

        dashboard.fetch_and_classify(2).await.unwrap();
        assert_eq!(dashboard.status().pending_review, 2);

        dashboard.fetch_and_classify(1).await.unwrap();
        assert_eq!(dashboard.status().pending_review, 1);
        assert!(matches!(
            dashboard.send_reply("m2", "late").await,
            Err(DashboardError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn retrain_prefers_uploaded_data() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(&dir, vec![]).await;

        let path = dashboard
            .upload_training_data(b"text,label\nquarterly invoice attached,billing\nlunch on friday,personal\n")
            .await
            .unwrap();
        assert!(path.exists());

        let summary = dashboard.retrain().await.unwrap();

        assert_eq!(summary.source, TrainingSource::Uploaded);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.labels, vec![Label::from("billing"), Label::from("personal")]);
    }

    #[tokio::test]
    async fn unusable_upload_falls_back_to_seed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dashboard, _) = dashboard(&dir, vec![]).await;
        dashboard.upload_training_data(b"no,header\n").await.unwrap();

        let summary = dashboard.retrain().await.unwrap();

        assert_eq!(summary.source, TrainingSource::Seed);
        assert_eq!(summary.samples, 4);
        assert!(dashboard.status().trained);
    }
}
