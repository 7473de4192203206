//! Presence tracking for Tether: who is connected right now.
//!
//! The registry is an actor. One Tokio task owns the membership table and
//! applies [`PresenceEvent`]s strictly in the order they arrive on its
//! queue. Nothing else ever touches the table, so there is no lock.
//!
//! ```text
//! session ──Joined──┐
//! session ──Left────┼──→ [queue] ──→ registry task ──→ PresenceTable
//! session ──Joined──┘
//! ```
//!
//! Sessions register through a [`PresenceGuard`]: creating one emits
//! `Joined`, dropping it emits `Left`. That ties deregistration to scope,
//! so every exit path (including a panic) leaves exactly once.

mod error;
mod registry;
mod table;

pub use error::PresenceError;
pub use registry::{PresenceGuard, PresenceHandle, PresenceService};
pub use table::{PresenceEvent, PresenceSnapshot, PresenceTable};
