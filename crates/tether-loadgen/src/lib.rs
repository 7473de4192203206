//! Load generator for Tether.
//!
//! Opens many authenticated connections against one server, keeps each
//! alive with a probe per interval, and tears them all down when a single
//! [`ShutdownSignal`] fires (Ctrl-C in the bundled binary).
//!
//! ```ignore
//! let signal = ShutdownSignal::new();
//! signal.listen_for_interrupt();
//! let issuer = Arc::new(SharedSecretAuth::new(b"changeme"));
//! let report = Coordinator::new(LoadConfig::default(), issuer)
//!     .run(signal)
//!     .await?;
//! ```

mod coordinator;
mod error;
mod peer;
mod signal;

pub use coordinator::{Coordinator, LoadConfig, LoadReport};
pub use error::LoadError;
pub use peer::{PeerExit, SimulatedPeer};
pub use signal::ShutdownSignal;
