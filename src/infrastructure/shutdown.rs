//! Shutdown signalling for the station runtime

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

/// Cloneable one-shot shutdown flag
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        if !self.sender.send_replace(true) {
            info!("🛑 Shutdown signal triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called, including
    /// when that happened before the wait started.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger `shutdown` on Ctrl+C.
pub async fn listen_for_ctrl_c(shutdown: ShutdownSignal) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("📡 Received Ctrl+C signal");
            shutdown.trigger();
        }
        Err(e) => error!(error = %e, "Failed to install Ctrl+C handler"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn late_waiter_sees_earlier_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("already triggered");
    }
}
