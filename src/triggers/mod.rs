pub mod poll_trigger;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

pub use crate::triggers::poll_trigger::{PollTrigger, PollTriggerBuilder};

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Error activating the trigger: {0}")]
    ActivationError(String),
}

/// One request to run a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// Name of the trigger that fired.
    pub source: String,
    /// Ticks fired by this trigger so far, starting at 1.
    pub sequence: u64,
}

#[async_trait]
pub trait Trigger: Send + Sync {
    /// Launches the trigger's long-running task.
    ///
    /// # Arguments
    /// * `tx` - The sender to send ticks back to the responder.
    /// * `shutdown_rx` - A broadcast receiver to listen for a shutdown signal.
    async fn launch(
        &self,
        tx: mpsc::Sender<Tick>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<tokio::task::JoinHandle<()>, TriggerError>;
}
