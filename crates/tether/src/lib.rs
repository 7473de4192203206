//! # Tether
//!
//! Presence tracking for WebSocket clients.
//!
//! A Tether server admits authenticated WebSocket connections, keeps a
//! registry of which peers are connected, and drops peers that stop
//! sending liveness probes. The `tether-loadgen` binary drives it with a
//! fleet of simulated peers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn start() -> Result<(), TetherError> {
//! let server = TetherServerBuilder::new()
//!     .bind("0.0.0.0:9999")
//!     .build(SharedSecretAuth::new(b"changeme"))
//!     .await?;
//! let snapshot = server.run().await?;
//! println!("{} peers joined", snapshot.joins);
//! # Ok(())
//! # }
//! ```

mod acceptor;
mod error;
mod server;
mod telemetry;

pub use error::TetherError;
pub use server::{TetherServer, TetherServerBuilder};
pub use telemetry::init_tracing;

/// Convenient re-exports for building servers and load tests.
pub mod prelude {
    pub use crate::{TetherError, TetherServer, TetherServerBuilder, init_tracing};

    pub use tether_loadgen::{
        Coordinator, LoadConfig, LoadReport, ShutdownSignal,
    };
    pub use tether_presence::{PresenceHandle, PresenceSnapshot};
    pub use tether_protocol::{AdmissionParams, Claims, CloseCode, PeerId};
    pub use tether_session::{
        Authenticator, CredentialIssuer, SessionConfig, SessionError,
        SharedSecretAuth,
    };
}
