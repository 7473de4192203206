//! One simulated client: connect, probe once per interval, stop on signal.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tether_protocol::{AdmissionParams, Claims, CloseCode, PeerId};
use tether_session::CredentialIssuer;
use tether_transport::{ClientConnection, Connection, Frame};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{LoadConfig, LoadError, ShutdownSignal};

/// How a simulated peer that did not fail stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerExit {
    /// The shutdown signal fired.
    Interrupted,
    /// The server closed the connection first.
    ServerClosed {
        /// Close code from the server (1006 when the stream just ended).
        code: CloseCode,
    },
}

/// A single load-test client.
pub struct SimulatedPeer {
    uid: PeerId,
    url_base: String,
    probe_interval: Duration,
    close_timeout: Duration,
    issuer: Arc<dyn CredentialIssuer>,
}

impl SimulatedPeer {
    /// Creates a peer that will connect as `uid` using `config`.
    pub fn new(
        uid: impl Into<PeerId>,
        config: &LoadConfig,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> Self {
        Self {
            uid: uid.into(),
            url_base: format!("ws://{}/ws", config.addr),
            probe_interval: config.probe_interval,
            close_timeout: config.close_timeout,
            issuer,
        }
    }

    /// The identifier this peer connects as.
    pub fn uid(&self) -> &PeerId {
        &self.uid
    }

    /// Connects and probes until `signal` fires or the server goes away.
    ///
    /// Failures are not retried.
    ///
    /// # Errors
    /// - [`LoadError::Credential`] if the token cannot be minted
    /// - [`LoadError::Transport`] if connecting or probing fails
    pub async fn run(self, signal: ShutdownSignal) -> Result<PeerExit, LoadError> {
        if signal.is_triggered() {
            return Ok(PeerExit::Interrupted);
        }

        let ts = unix_now().as_secs() as i64;
        let token = self.issuer.mint(&Claims::new(self.uid.as_str(), ts))?;
        let params = AdmissionParams::new(self.uid.clone(), ts);
        let url = format!("{}?{}", self.url_base, params.to_query());

        let mut conn = tokio::select! {
            biased;
            () = signal.wait() => return Ok(PeerExit::Interrupted),
            conn = tether_transport::connect(&url, &token) => conn?,
        };
        debug!(uid = %self.uid, id = %conn.id(), "peer connected");

        let start = Instant::now() + self.probe_interval;
        let mut probes = tokio::time::interval_at(start, self.probe_interval);
        probes.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                () = signal.wait() => {
                    self.close(&mut conn).await;
                    return Ok(PeerExit::Interrupted);
                }

                _ = probes.tick() => {
                    let payload = unix_now().as_millis().to_string();
                    if let Err(e) = conn.send(Frame::Ping(payload.into_bytes())).await {
                        warn!(uid = %self.uid, error = %e, "probe failed");
                        return Err(e.into());
                    }
                }

                frame = conn.recv() => match frame {
                    Ok(Some(Frame::Close(close))) => {
                        let code = CloseCode::of(close.as_ref());
                        info!(uid = %self.uid, %code, "server closed connection");
                        return Ok(PeerExit::ServerClosed { code });
                    }
                    Ok(None) => {
                        info!(uid = %self.uid, "connection ended");
                        return Ok(PeerExit::ServerClosed {
                            code: CloseCode::ABNORMAL,
                        });
                    }
                    Ok(Some(_)) => {}
                    Err(e) => {
                        warn!(uid = %self.uid, error = %e, "read failed");
                        return Err(e.into());
                    }
                },
            }
        }
    }

    /// Sends one Normal close frame, bounded by the close timeout. The
    /// outcome is only logged.
    async fn close(&self, conn: &mut ClientConnection) {
        let frame = CloseCode::NORMAL.frame("");
        match tokio::time::timeout(self.close_timeout, conn.close(frame)).await {
            Ok(Ok(())) => debug!(uid = %self.uid, "close sent"),
            Ok(Err(e)) => debug!(uid = %self.uid, error = %e, "close failed"),
            Err(_) => debug!(uid = %self.uid, "close timed out"),
        }
    }
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
