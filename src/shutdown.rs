use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

/// Something that decides when the responder or the dashboard stops.
#[async_trait]
pub trait Shutdown: Send + Sync {
    /// Resolves once a shutdown has been requested.
    async fn wait_for_signal(&mut self);
}

/// Stops on operator interrupt.
#[derive(Default)]
pub struct CtrlCShutdown;

impl CtrlCShutdown {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Shutdown for CtrlCShutdown {
    async fn wait_for_signal(&mut self) {
        // A failure to install the handler counts as a signal.
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, initiating graceful shutdown");
    }
}

/// Stops after a fixed running time.
pub struct TimeBasedShutdown {
    duration: Duration,
}

impl TimeBasedShutdown {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Shutdown for TimeBasedShutdown {
    async fn wait_for_signal(&mut self) {
        info!(duration = %humantime::format_duration(self.duration), "Shutdown scheduled");
        tokio::time::sleep(self.duration).await;
        info!("Time-based shutdown triggered");
    }
}

/// Stops when the paired [`oneshot::Sender`] fires or is dropped.
pub struct ManualShutdown {
    rx: Option<oneshot::Receiver<()>>,
}

impl ManualShutdown {
    pub fn new() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx: Some(rx) })
    }
}

#[async_trait]
impl Shutdown for ManualShutdown {
    async fn wait_for_signal(&mut self) {
        if let Some(rx) = self.rx.take() {
            let _ = rx.await;
            info!("Shutdown requested");
        }
    }
}

/// Turns a handler into a future, for APIs such as axum's graceful shutdown.
pub async fn signal(mut handler: impl Shutdown) {
    handler.wait_for_signal().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn time_based_shutdown_fires_after_duration() {
        let mut handler = TimeBasedShutdown::new(Duration::from_millis(10));
        let fired = tokio::time::timeout(Duration::from_millis(500), handler.wait_for_signal()).await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn manual_shutdown_waits_for_sender() {
        let (tx, handler) = ManualShutdown::new();
        let waiter = tokio::spawn(signal(handler));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.send(()).unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(200), waiter).await.is_ok());
    }
}
