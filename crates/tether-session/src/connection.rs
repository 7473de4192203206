//! The per-connection session loop.
//!
//! Each admitted connection gets its own Tokio task running
//! [`ConnectionSession::run`]. The flow is:
//!   1. Register with the presence registry → `Active`
//!   2. Loop: read frames, answer probes, watch the liveness deadline
//!   3. On close (either side) → `Closing`, finish the handshake
//!   4. Release the transport, deregister → `Closed`
//!
//! The session is the only owner of its connection. Other sessions only
//! ever learn about it through the registry.

use std::time::Duration;

use tether_presence::PresenceHandle;
use tether_protocol::{CloseCode, PeerId};
use tether_transport::{Connection, Frame};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    LivenessPolicy, SessionConfig, SessionError, SessionOutcome, SessionState,
};

/// One peer's connection, from upgrade to close.
pub struct ConnectionSession<C> {
    peer: PeerId,
    conn: C,
    state: SessionState,
    policy: LivenessPolicy,
    ack_timeout: Duration,
    close_timeout: Duration,
    last_activity: Instant,
    shutdown: CancellationToken,
}

impl<C: Connection> ConnectionSession<C> {
    /// Wraps an upgraded connection. The session starts in
    /// [`SessionState::Connecting`] and does nothing until [`run`](Self::run).
    pub fn new(peer: PeerId, conn: C, config: &SessionConfig) -> Self {
        Self {
            peer,
            conn,
            state: SessionState::Connecting,
            policy: config.liveness(),
            ack_timeout: config.ack_timeout,
            close_timeout: config.close_timeout,
            last_activity: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Closes the session with "going away" when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Runs the session to completion.
    ///
    /// Emits exactly one `Joined` when the session becomes active and
    /// exactly one `Left` when it ends, whatever the exit path. Errors
    /// stay inside this session; they are returned for logging only.
    ///
    /// # Errors
    /// - [`SessionError::Presence`] if the registry is not running (the
    ///   session never becomes active and nothing is registered)
    /// - [`SessionError::Transport`] on a read failure or a non-transient
    ///   acknowledgment failure
    pub async fn run(
        mut self,
        presence: PresenceHandle,
    ) -> Result<SessionOutcome, SessionError> {
        let conn_id = self.conn.id();

        let guard = match presence.join(self.peer.clone()) {
            Ok(guard) => guard,
            Err(e) => {
                self.state.transition(SessionState::Closed)?;
                return Err(e.into());
            }
        };
        self.state.transition(SessionState::Active)?;
        self.last_activity = Instant::now();
        tracing::debug!(peer = %self.peer, %conn_id, "session active");

        let result = self.read_loop().await;

        // Closing → Closed or Active → Closed; both are always allowed.
        let _ = self.state.transition(SessionState::Closed);
        let Self { peer, conn, .. } = self;
        drop(conn);
        guard.leave();

        if let Ok(outcome) = &result {
            tracing::info!(%peer, %conn_id, ?outcome, "session closed");
        }
        result
    }

    async fn read_loop(&mut self) -> Result<SessionOutcome, SessionError> {
        loop {
            let deadline = self.policy.expires_at(self.last_activity);

            let read = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.state.transition(SessionState::Closing)?;
                    let frame =
                        CloseCode::GOING_AWAY.frame("server shutting down");
                    if let Err(e) = self.conn.close(frame).await {
                        tracing::debug!(
                            peer = %self.peer,
                            error = %e,
                            "close frame not sent"
                        );
                    } else {
                        self.finish_close().await;
                    }
                    return Ok(SessionOutcome::ServerShutdown);
                }

                read = tokio::time::timeout_at(deadline, self.conn.recv()) => read,
            };

            match read {
                Err(_elapsed) => {
                    let now = Instant::now();
                    debug_assert!(
                        !self.policy.is_alive(self.last_activity, now),
                        "liveness timer fired before the window elapsed"
                    );
                    tracing::warn!(
                        peer = %self.peer,
                        window = ?self.policy.window(),
                        idle = ?now.duration_since(self.last_activity),
                        "no probe within liveness window"
                    );
                    return Ok(SessionOutcome::LivenessExpired);
                }
                Ok(Err(e)) => {
                    tracing::debug!(peer = %self.peer, error = %e, "read failed");
                    return Err(e.into());
                }
                Ok(Ok(None)) => return Ok(SessionOutcome::StreamEnded),
                Ok(Ok(Some(Frame::Ping(payload)))) => {
                    self.on_probe(payload).await?;
                }
                Ok(Ok(Some(Frame::Close(close)))) => {
                    let code = CloseCode::of(close.as_ref());
                    if !code.is_expected() {
                        tracing::warn!(
                            peer = %self.peer,
                            %code,
                            "unexpected close code"
                        );
                    }
                    self.state.transition(SessionState::Closing)?;
                    self.finish_close().await;
                    return Ok(SessionOutcome::PeerClosed { code });
                }
                // No application protocol: payloads and pongs are dropped.
                Ok(Ok(Some(Frame::Data(_) | Frame::Pong(_)))) => {}
            }
        }
    }

    /// Handles a liveness probe: refresh the deadline, then acknowledge.
    ///
    /// Acknowledgment failures are swallowed while closing, when transient,
    /// or when the send budget runs out. Anything else is returned.
    async fn on_probe(
        &mut self,
        payload: Vec<u8>,
    ) -> Result<(), SessionError> {
        self.last_activity = Instant::now();

        let ack = self.conn.send(Frame::Pong(payload));
        let sent = tokio::time::timeout(self.ack_timeout, ack).await;
        let closing = self.state == SessionState::Closing;
        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if closing || e.is_transient() => {
                tracing::debug!(
                    peer = %self.peer,
                    error = %e,
                    "acknowledgment dropped"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => {
                tracing::debug!(peer = %self.peer, "acknowledgment timed out");
                Ok(())
            }
        }
    }

    /// Keeps reading until the close handshake completes or the close
    /// budget runs out. Probes are still answered meanwhile.
    async fn finish_close(&mut self) {
        let budget = self.close_timeout;
        let drained = tokio::time::timeout(budget, async {
            loop {
                match self.conn.recv().await {
                    Ok(Some(Frame::Ping(payload))) => {
                        if let Err(e) = self.on_probe(payload).await {
                            tracing::debug!(
                                peer = %self.peer,
                                error = %e,
                                "probe during close"
                            );
                        }
                    }
                    Ok(Some(Frame::Close(_)) | None) | Err(_) => break,
                    Ok(Some(_)) => {}
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::debug!(
                peer = %self.peer,
                "peer did not finish closing in time"
            );
        }
    }
}
