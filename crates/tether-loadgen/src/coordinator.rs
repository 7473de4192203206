//! Spawns the simulated peers and tallies how they ended.

use std::sync::Arc;
use std::time::Duration;

use tether_protocol::DEFAULT_PROBE_INTERVAL;
use tether_session::CredentialIssuer;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{LoadError, PeerExit, ShutdownSignal, SimulatedPeer};

/// Settings for one load-test run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Server address, `host:port`. Default: `localhost:9999`.
    pub addr: String,
    /// How many peers to simulate. Default: 1000.
    pub peers: usize,
    /// Time between probes from each peer. Default: 1 second.
    pub probe_interval: Duration,
    /// Budget for the close frame sent on shutdown. Default: 1 second.
    pub close_timeout: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:9999".into(),
            peers: 1000,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl LoadConfig {
    /// Checks the settings before any peer is spawned.
    ///
    /// # Errors
    /// [`LoadError::InvalidConfig`] for an empty address, zero peers or a
    /// zero probe interval.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.addr.is_empty() {
            return Err(LoadError::InvalidConfig("empty server address".into()));
        }
        if self.peers == 0 {
            return Err(LoadError::InvalidConfig("peer count is zero".into()));
        }
        if self.probe_interval.is_zero() {
            return Err(LoadError::InvalidConfig("probe interval is zero".into()));
        }
        Ok(())
    }
}

/// How the peers of a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Stopped by the shutdown signal.
    pub interrupted: usize,
    /// Closed by the server.
    pub server_closed: usize,
    /// Failed to mint, connect, read or write (or panicked).
    pub failed: usize,
}

impl LoadReport {
    /// Total peers accounted for.
    pub fn total(&self) -> usize {
        self.interrupted + self.server_closed + self.failed
    }

    fn record(&mut self, result: &Result<PeerExit, LoadError>) {
        match result {
            Ok(PeerExit::Interrupted) => self.interrupted += 1,
            Ok(PeerExit::ServerClosed { .. }) => self.server_closed += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Runs a fleet of [`SimulatedPeer`]s against one server.
pub struct Coordinator {
    config: LoadConfig,
    issuer: Arc<dyn CredentialIssuer>,
}

impl Coordinator {
    /// Creates a coordinator that mints credentials with `issuer`.
    pub fn new(config: LoadConfig, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self { config, issuer }
    }

    /// Spawns peers `"1"..="N"` and waits for all of them to stop.
    ///
    /// Each peer runs until `signal` fires or its own connection ends; a
    /// failed peer does not affect the others.
    ///
    /// # Errors
    /// [`LoadError::InvalidConfig`] if the configuration is unusable.
    /// Per-peer failures are counted in the report, not returned.
    pub async fn run(&self, signal: ShutdownSignal) -> Result<LoadReport, LoadError> {
        self.config.validate()?;
        info!(
            addr = %self.config.addr,
            peers = self.config.peers,
            "starting load test"
        );

        let mut tasks = JoinSet::new();
        for n in 1..=self.config.peers {
            let peer =
                SimulatedPeer::new(n.to_string(), &self.config, self.issuer.clone());
            let signal = signal.clone();
            tasks.spawn(async move {
                let uid = peer.uid().clone();
                let result = peer.run(signal).await;
                if let Err(e) = &result {
                    debug!(%uid, error = %e, "peer failed");
                }
                result
            });
        }

        let mut report = LoadReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => report.record(&result),
                Err(e) => {
                    warn!(error = %e, "peer task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            interrupted = report.interrupted,
            server_closed = report.server_closed,
            failed = report.failed,
            "load test finished"
        );
        Ok(report)
    }
}
