use crate::classifier::{EmailClassifier, Label};
use crate::config::DEFAULT_FETCH_LIMIT;
use crate::generator::ResponseGenerator;
use crate::mailbox::{Mailbox, MailboxError, Message, MessageRef, OutgoingReply};
use crate::normalizer::normalize;
use crate::shutdown::Shutdown;
use crate::triggers::{Tick, Trigger};
use crate::utils::google_auth::AuthError;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum AgentError {
    /// The responder cannot run until the operator fixes its setup.
    #[error("Configuration error: {0}")]
    Configuration(AuthError),
    #[error("Authentication failed: {0}")]
    Authentication(AuthError),
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
    #[error("No trigger could be launched")]
    NoTrigger,
}

impl AgentError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Configuration(_) | AgentError::NoTrigger)
    }
}

impl From<AuthError> for AgentError {
    fn from(e: AuthError) -> Self {
        if e.is_configuration() {
            AgentError::Configuration(e)
        } else {
            AgentError::Authentication(e)
        }
    }
}

/// What happened to one message in a poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Replied { label: Label, marked_read: bool },
    SkippedSpam { marked_read: bool },
    /// The reply was not sent; the message stays unread.
    SendFailed { label: Label },
    /// The message could not be fetched or classified.
    Failed,
}

/// Summary of one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub listed: usize,
    pub replied: usize,
    pub spam: usize,
    pub send_failed: usize,
    pub failed: usize,
    pub marked_read: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Replied { marked_read, .. } => {
                self.replied += 1;
                self.marked_read += usize::from(*marked_read);
            }
            MessageOutcome::SkippedSpam { marked_read } => {
                self.spam += 1;
                self.marked_read += usize::from(*marked_read);
            }
            MessageOutcome::SendFailed { .. } => self.send_failed += 1,
            MessageOutcome::Failed => self.failed += 1,
        }
    }
}

/// Polls the mailbox and answers every unread, non-spam message.
///
/// Each tick from a trigger runs one [`poll_cycle`](AutoResponder::poll_cycle).
/// Ticks are consumed one at a time, so cycles never overlap. The loop ends
/// when the shutdown handler fires, when every trigger has stopped, or on a
/// configuration error.
pub struct AutoResponder {
    mailbox: Box<dyn Mailbox>,
    classifier: EmailClassifier,
    generator: ResponseGenerator,
    fetch_limit: u32,
    triggers: Vec<Box<dyn Trigger>>,
    shutdown_handler: Option<Box<dyn Shutdown>>,
}

impl AutoResponder {
    pub fn new(
        mailbox: Box<dyn Mailbox>,
        classifier: EmailClassifier,
        generator: ResponseGenerator,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            generator,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            triggers: Vec::new(),
            shutdown_handler: None,
        }
    }

    pub fn with_fetch_limit(mut self, fetch_limit: u32) -> Self {
        self.fetch_limit = fetch_limit;
        self
    }

    pub fn add_trigger(mut self, t: Box<dyn Trigger>) -> Self {
        self.triggers.push(t);
        self
    }

    pub fn with_shutdown_handler(mut self, handler: impl Shutdown + 'static) -> Self {
        self.shutdown_handler = Some(Box::new(handler));
        self
    }

    pub async fn run(mut self) -> Result<(), AgentError> {
        let (tick_rx, shutdown_tx, trigger_handles) = self.launch_triggers().await;
        if trigger_handles.is_empty() {
            error!("No trigger running, nothing would ever poll");
            return Err(AgentError::NoTrigger);
        }

        let outcome = if let Some(mut handler) = self.shutdown_handler.take() {
            tokio::select! {
                result = self.tick_loop(tick_rx) => result,
                _ = handler.wait_for_signal() => {
                    info!("External shutdown signal triggered termination");
                    Ok(())
                }
            }
        } else {
            self.tick_loop(tick_rx).await
        };

        self.shutdown_triggers(shutdown_tx, trigger_handles).await;

        match &outcome {
            Ok(()) => info!("Auto-responder has shut down gracefully"),
            Err(e) => error!(error = %e, "Auto-responder stopped"),
        }
        outcome
    }

    async fn tick_loop(&mut self, mut tick_rx: mpsc::Receiver<Tick>) -> Result<(), AgentError> {
        info!("Waiting for poll ticks");
        while let Some(tick) = tick_rx.recv().await {
            debug!(source = %tick.source, sequence = tick.sequence, "Received tick");

            match self.poll_cycle().await {
                Ok(report) => info!(?report, "Poll cycle finished"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "Poll cycle aborted, retrying on next tick"),
            }
        }
        debug!("Tick loop terminated, no trigger left");
        Ok(())
    }

    /// Authenticates, then processes up to `fetch_limit` unread messages in
    /// order. Per-message failures are logged and counted, never raised.
    pub async fn poll_cycle(&mut self) -> Result<BatchReport, AgentError> {
        self.mailbox.authenticate().await?;

        let refs = self.mailbox.list_unread(self.fetch_limit).await?;
        let mut report = BatchReport {
            listed: refs.len(),
            ..Default::default()
        };
        if refs.is_empty() {
            debug!("No unread messages");
            return Ok(report);
        }

        info!(count = refs.len(), "Processing unread messages");
        for message_ref in &refs {
            let outcome = self.process_message(message_ref).await;
            report.record(&outcome);
        }
        Ok(report)
    }

    async fn process_message(&mut self, message_ref: &MessageRef) -> MessageOutcome {
        let message = match self.mailbox.fetch_full(message_ref).await {
            Ok(message) => message,
            Err(e) => {
                error!(message_id = %message_ref.id, error = %e, "Failed to fetch message");
                return MessageOutcome::Failed;
            }
        };

        let label = match self.classifier.predict(&normalize(&message.body)) {
            Ok(label) => label,
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Failed to classify message");
                return MessageOutcome::Failed;
            }
        };
        info!(message_id = %message.id, from = %message.from, %label, "Classified message");

        if label.is_spam() {
            let marked_read = self.mailbox.mark_read(message_ref).await;
            info!(message_id = %message.id, "Spam, not replying");
            return MessageOutcome::SkippedSpam { marked_read };
        }

        self.reply(message_ref, &message, label).await
    }

    async fn reply(&mut self, message_ref: &MessageRef, message: &Message, label: Label) -> MessageOutcome {
        let body = self.generator.generate(&message.body).await;
        let reply = OutgoingReply::reply_to(message, body);

        if !self.mailbox.send(&reply).await {
            warn!(message_id = %message.id, "Reply not sent, leaving message unread");
            return MessageOutcome::SendFailed { label };
        }

        let marked_read = self.mailbox.mark_read(message_ref).await;
        MessageOutcome::Replied { label, marked_read }
    }

    async fn launch_triggers(&self) -> (mpsc::Receiver<Tick>, broadcast::Sender<()>, Vec<JoinHandle<()>>) {
        // One slot: a tick that arrives mid-cycle waits, later ones block the trigger.
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut trigger_handles = Vec::new();

        info!(trigger_count = self.triggers.len(), "Launching triggers");
        for (index, trigger) in self.triggers.iter().enumerate() {
            let shutdown_rx = shutdown_tx.subscribe();
            match trigger.launch(tick_tx.clone(), shutdown_rx).await {
                Ok(handle) => {
                    debug!(trigger_index = index, "Trigger launched successfully");
                    trigger_handles.push(handle);
                }
                Err(e) => {
                    error!(trigger_index = index, error = %e, "Failed to launch trigger");
                }
            }
        }

        (tick_rx, shutdown_tx, trigger_handles)
    }

    async fn shutdown_triggers(&self, shutdown_tx: broadcast::Sender<()>, trigger_handles: Vec<JoinHandle<()>>) {
        debug!(trigger_count = trigger_handles.len(), "Sending shutdown signal to all triggers");
        let _ = shutdown_tx.send(());
        for (index, handle) in trigger_handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(trigger_index = index, error = %e, "Error waiting for trigger to terminate");
            }
        }
        info!("All triggers have been shut down");
    }
}
