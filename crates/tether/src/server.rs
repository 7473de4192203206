//! `TetherServer` builder and server loop.
//!
//! This is the entry point for running a Tether presence server. It ties
//! together all the layers: transport → admission → session → presence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tether_presence::{PresenceHandle, PresenceService, PresenceSnapshot};
use tether_session::{Authenticator, SessionConfig};
use tether_transport::{Transport, WebSocketTransport};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::TetherError;
use crate::acceptor::admit;

/// Pause after a failed accept. Errors like `EMFILE` persist until some
/// connection closes, so retrying at once would spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection task.
///
/// Read-only after startup, so an `Arc` is all the sharing it needs.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) auth: A,
    pub(crate) config: SessionConfig,
}

/// Builder for configuring and starting a Tether server.
///
/// # Example
///
/// ```rust,ignore
/// use tether::prelude::*;
///
/// let server = TetherServerBuilder::new()
///     .bind("0.0.0.0:9999")
///     .build(SharedSecretAuth::new(b"changeme"))
///     .await?;
/// server.run().await
/// ```
pub struct TetherServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl TetherServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9999".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and starts the presence registry.
    ///
    /// # Errors
    /// - [`TetherError::Session`] if the session configuration is invalid
    /// - [`TetherError::Transport`] if the address cannot be bound
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<TetherServer<A>, TetherError> {
        self.session_config.validate()?;

        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_max_message_size(self.session_config.max_message_size);
        let presence = PresenceService::start();

        let state = Arc::new(ServerState {
            auth,
            config: self.session_config,
        });

        Ok(TetherServer {
            transport,
            presence,
            state,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for TetherServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tether server.
///
/// Call [`run()`](Self::run) to start accepting connections, and cancel
/// its [`shutdown_token`](Self::shutdown_token) to stop it.
pub struct TetherServer<A: Authenticator> {
    transport: WebSocketTransport,
    presence: PresenceService,
    state: Arc<ServerState<A>>,
    shutdown: CancellationToken,
}

impl<A: Authenticator> TetherServer<A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the presence registry, for querying who is connected.
    pub fn presence(&self) -> PresenceHandle {
        self.presence.handle()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the accept loop until the shutdown token is cancelled.
    ///
    /// Each accepted socket is admitted in its own task; the loop never
    /// waits on one. On shutdown every open session is closed with
    /// "going away", the loop waits for them all, then stops the registry
    /// and returns its final snapshot.
    ///
    /// # Errors
    /// [`TetherError::Presence`] if the registry task died.
    pub async fn run(mut self) -> Result<PresenceSnapshot, TetherError> {
        let tracker = TaskTracker::new();
        tracing::info!(addr = ?self.local_addr().ok(), "Tether server running");

        while let Some(pending) =
            next_incoming(&mut self.transport, &self.shutdown).await
        {
            let state = Arc::clone(&self.state);
            let presence = self.presence.handle();
            let shutdown = self.shutdown.child_token();
            tracker.spawn(async move {
                if let Err(e) = admit(pending, state, presence, shutdown).await {
                    tracing::debug!(error = %e, "connection ended with error");
                }
            });
        }

        tracing::info!(sessions = tracker.len(), "shutting down");
        tracker.close();
        tracker.wait().await;

        let snapshot = self.presence.stop().await?;
        tracing::info!(
            joins = snapshot.joins,
            leaves = snapshot.leaves,
            "server stopped"
        );
        Ok(snapshot)
    }
}

/// Waits for the next accepted socket, or `None` once `shutdown` fires.
///
/// Accept errors are logged and retried after [`ACCEPT_BACKOFF`].
async fn next_incoming<T: Transport>(
    transport: &mut T,
    shutdown: &CancellationToken,
) -> Option<T::Incoming> {
    loop {
        let accepted = tokio::select! {
            biased;
            () = shutdown.cancelled() => return None,
            accepted = transport.accept() => accepted,
        };

        match accepted {
            Ok(incoming) => return Some(incoming),
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                tokio::select! {
                    () = shutdown.cancelled() => return None,
                    () = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }
}
