//! Connection session management for Tether.
//!
//! This crate handles the lifecycle of one peer's connection:
//!
//! 1. **Authentication** — checking a bearer credential ([`Authenticator`])
//!    and, on the client side, minting one ([`CredentialIssuer`])
//! 2. **Liveness** — deciding whether a peer is still there
//!    ([`LivenessPolicy`])
//! 3. **Session loop** — reading frames, answering probes, and closing
//!    cleanly ([`ConnectionSession`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Presence Layer  ← receives Joined/Left from sessions
//!     ↕
//! Session Layer (this crate)  ← owns one connection each
//!     ↕
//! Transport Layer  ← frames, ping/pong, close
//! ```

mod auth;
mod connection;
mod error;
mod liveness;
mod session;

pub use auth::{Authenticator, CredentialIssuer, SharedSecretAuth, bearer_token};
pub use connection::ConnectionSession;
pub use error::SessionError;
pub use liveness::{LivenessPolicy, is_alive};
pub use session::{SessionConfig, SessionOutcome, SessionState};
