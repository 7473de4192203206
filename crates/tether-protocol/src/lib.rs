//! Protocol vocabulary for Tether.
//!
//! Tether has no application message format of its own. What the client
//! and server do agree on is small:
//!
//! - **Admission** ([`AdmissionParams`]) — the `uid` and `ts` query
//!   parameters every upgrade request carries.
//! - **Credentials** ([`Claims`]) — what a bearer token asserts about the
//!   caller.
//! - **Close codes** ([`CloseCode`]) — which close statuses count as an
//!   ordinary goodbye.
//! - **Timing defaults** — probe interval, liveness window and
//!   acknowledgment budget shared by both sides.
//!
//! ```text
//! Transport (frames) → Protocol (admission, close codes) → Session
//! ```

mod admission;
mod error;
mod types;

pub use admission::AdmissionParams;
pub use error::ProtocolError;
pub use types::{
    Claims, CloseCode, DEFAULT_ACK_TIMEOUT, DEFAULT_LIVENESS_WINDOW,
    DEFAULT_PROBE_INTERVAL, MAX_MESSAGE_SIZE, PeerId,
};
