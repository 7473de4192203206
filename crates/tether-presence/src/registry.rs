//! Registry actor: a Tokio task that owns the [`PresenceTable`].
//!
//! Each command travels over a single unbounded mpsc queue, so the order
//! in which commands are enqueued is the order in which they are applied.
//! The queue is unbounded because `Left` is emitted from `Drop`, which
//! cannot wait for capacity.

use tether_protocol::PeerId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{PresenceError, PresenceEvent, PresenceSnapshot, PresenceTable};

/// Commands processed by the registry task.
enum PresenceCommand {
    /// Apply a join/leave event.
    Apply(PresenceEvent),

    /// Report the current membership.
    Snapshot {
        reply: oneshot::Sender<PresenceSnapshot>,
    },

    /// Finish processing everything queued so far, then exit.
    Stop,
}

/// Cheap, cloneable handle for sending commands to the registry.
#[derive(Clone)]
pub struct PresenceHandle {
    sender: mpsc::UnboundedSender<PresenceCommand>,
}

impl PresenceHandle {
    /// Enqueues an event without waiting for it to be applied.
    ///
    /// # Errors
    /// Returns [`PresenceError::Unavailable`] if the registry has stopped.
    pub fn publish(&self, event: PresenceEvent) -> Result<(), PresenceError> {
        self.sender
            .send(PresenceCommand::Apply(event))
            .map_err(|_| PresenceError::Unavailable)
    }

    /// Registers `peer` and returns the guard that will deregister it.
    ///
    /// # Errors
    /// Returns [`PresenceError::Unavailable`] if the registry has stopped;
    /// no guard is created in that case, so no `Left` will follow.
    pub fn join(&self, peer: PeerId) -> Result<PresenceGuard, PresenceError> {
        self.publish(PresenceEvent::Joined(peer.clone()))?;
        Ok(PresenceGuard {
            peer,
            handle: self.clone(),
        })
    }

    /// Returns the membership after every command enqueued before this
    /// call has been applied.
    pub async fn snapshot(&self) -> Result<PresenceSnapshot, PresenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(PresenceCommand::Snapshot { reply: reply_tx })
            .map_err(|_| PresenceError::Unavailable)?;
        reply_rx.await.map_err(|_| PresenceError::Unavailable)
    }

    /// Whether `peer` is present once earlier commands have been applied.
    pub async fn is_present(&self, peer: &PeerId) -> Result<bool, PresenceError> {
        Ok(self.snapshot().await?.contains(peer))
    }
}

/// Proof that a peer has been registered. Dropping it deregisters the peer.
///
/// A guard can only be created by [`PresenceHandle::join`] and cannot be
/// cloned, so each registration produces exactly one `Left`.
#[must_use = "dropping the guard immediately deregisters the peer"]
pub struct PresenceGuard {
    peer: PeerId,
    handle: PresenceHandle,
}

impl PresenceGuard {
    /// The registered peer.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Deregisters now instead of at the end of the enclosing scope.
    pub fn leave(self) {}
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        let event = PresenceEvent::Left(self.peer.clone());
        if self.handle.publish(event).is_err() {
            tracing::debug!(peer = %self.peer, "registry gone, leave not recorded");
        }
    }
}

/// The running registry: owns the task and controls its lifetime.
///
/// Created once by the server's composition root. [`stop`](Self::stop)
/// drains the queue and returns the final membership.
pub struct PresenceService {
    handle: PresenceHandle,
    task: JoinHandle<PresenceSnapshot>,
}

impl PresenceService {
    /// Spawns the registry task on the current Tokio runtime.
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(PresenceTable::new(), receiver));
        tracing::debug!("presence registry started");
        Self {
            handle: PresenceHandle { sender },
            task,
        }
    }

    /// Returns a handle for publishing events and querying membership.
    pub fn handle(&self) -> PresenceHandle {
        self.handle.clone()
    }

    /// Stops the registry after everything already queued is applied.
    ///
    /// Events published after this point are discarded.
    ///
    /// # Errors
    /// Returns [`PresenceError::Unavailable`] if the task had already died.
    pub async fn stop(self) -> Result<PresenceSnapshot, PresenceError> {
        // A failed send means the task already exited; the join below
        // reports how.
        let _ = self.handle.sender.send(PresenceCommand::Stop);
        self.task.await.map_err(|_| PresenceError::Unavailable)
    }
}

/// The actor loop.
async fn run(
    mut table: PresenceTable,
    mut receiver: mpsc::UnboundedReceiver<PresenceCommand>,
) -> PresenceSnapshot {
    while let Some(cmd) = receiver.recv().await {
        match cmd {
            PresenceCommand::Apply(event) => table.apply(event),
            PresenceCommand::Snapshot { reply } => {
                let _ = reply.send(table.snapshot());
            }
            PresenceCommand::Stop => break,
        }
    }

    let snapshot = table.snapshot();
    tracing::info!(
        online = snapshot.len(),
        joins = snapshot.joins,
        leaves = snapshot.leaves,
        "presence registry stopped"
    );
    snapshot
}
