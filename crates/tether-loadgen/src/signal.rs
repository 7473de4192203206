//! Process-wide shutdown signal for simulated peers.
//!
//! The signal is level-triggered: once fired it stays fired. A peer that
//! starts waiting after the trigger returns immediately, and no peer can
//! consume the signal on behalf of another, so every waiter sees it
//! exactly once no matter how many are waiting when it fires.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable, one-shot "stop now" broadcast.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Calling it again has no effect.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has fired. Cancel-safe.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Spawns a task that fires the signal on Ctrl-C, or SIGTERM on Unix.
    ///
    /// The task ends after the first interrupt, or when the signal fires
    /// some other way.
    pub fn listen_for_interrupt(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = interrupted() => signal.trigger(),
                () = signal.wait() => {}
            }
        })
    }
}

#[cfg(unix)]
async fn interrupted() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            info!(error = %err, "SIGTERM handler unavailable");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        () = ctrl_c() => {}
        _ = terminate.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn interrupted() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C"),
        Err(err) => {
            // Without a handler, Ctrl-C can never be observed here.
            info!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_sticky() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        signal.trigger();
        signal.trigger();
        assert!(signal.is_triggered());
        signal.wait().await;
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        other.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_listener_exits_when_triggered_elsewhere() {
        let signal = ShutdownSignal::new();
        let listener = signal.listen_for_interrupt();
        signal.trigger();
        listener.await.unwrap();
    }
}
