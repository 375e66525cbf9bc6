// The `poll_trigger` module provides a trigger that requests a poll cycle at a fixed interval.

use crate::triggers::{Tick, Trigger, TriggerError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A builder for [`PollTrigger`].
pub struct PollTriggerBuilder {
    name: String,
    interval: Duration,
    hot_start: bool,
}

impl PollTriggerBuilder {
    /// Creates a new `PollTriggerBuilder`.
    ///
    /// # Arguments
    ///
    /// * `name` - The name reported with every tick.
    /// * `interval` - The time between two ticks.
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            hot_start: true,
        }
    }

    /// Sets whether the first tick fires immediately upon launch.
    pub fn with_hot_start(mut self, hot_start: bool) -> Self {
        self.hot_start = hot_start;
        self
    }

    /// Builds a `PollTrigger`.
    pub fn build(&self) -> PollTrigger {
        PollTrigger {
            name: self.name.clone(),
            interval: self.interval,
            hot_start: self.hot_start,
        }
    }
}

/// Fires a [`Tick`] at a fixed interval.
///
/// A cycle that outlasts the interval delays the next tick instead of
/// producing a burst of catch-up ticks, and the channel only holds what the
/// consumer has not yet picked up, so cycles never overlap.
pub struct PollTrigger {
    name: String,
    interval: Duration,
    hot_start: bool,
}

#[async_trait]
impl Trigger for PollTrigger {
    async fn launch(
        &self,
        tx: mpsc::Sender<Tick>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, TriggerError> {
        if self.interval.is_zero() {
            return Err(TriggerError::ActivationError(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let interval = self.interval;
        let name = self.name.clone();
        let hot_start = self.hot_start;

        let task_handle = tokio::spawn(async move {
            let mut start_time = Instant::now();
            if !hot_start {
                start_time += interval;
            }
            let mut ticker = tokio::time::interval_at(start_time, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sequence = 0u64;

            info!(trigger_name = %name, interval = %humantime::format_duration(interval), "PollTrigger started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(trigger_name = %name, "PollTrigger received shutdown signal, terminating");
                        break;
                    }

                    _ = ticker.tick() => {
                        sequence += 1;
                        let tick = Tick {
                            source: name.clone(),
                            sequence,
                        };

                        debug!(trigger_name = %name, sequence, "Firing tick");

                        if let Err(e) = tx.send(tick).await {
                            warn!(trigger_name = %name, error = %e, "Main channel closed, stopping trigger");
                            break;
                        }
                    }
                }
            }
            debug!(trigger_name = %name, "PollTrigger task completed");
        });

        Ok(task_handle)
    }
}
