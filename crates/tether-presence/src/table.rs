//! The membership table and the events that change it.
//!
//! `PresenceTable` is plain data with no synchronization. It is only ever
//! mutated by the registry task, one event at a time.

use std::collections::{BTreeSet, HashMap};

use tether_protocol::PeerId;
use tokio::time::Instant;

/// A lifecycle event emitted by a connection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// The peer's session became active.
    Joined(PeerId),
    /// The peer's session closed.
    Left(PeerId),
}

impl PresenceEvent {
    /// The peer this event is about.
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::Joined(peer) | Self::Left(peer) => peer,
        }
    }
}

/// A present peer: when it first joined and how many of its sessions are
/// still open.
#[derive(Debug, Clone, Copy)]
struct Presence {
    since: Instant,
    sessions: u32,
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    /// Peers currently present, in sorted order.
    pub members: BTreeSet<PeerId>,
    /// Total `Joined` events applied since start.
    pub joins: u64,
    /// Total `Left` events applied since start.
    pub leaves: u64,
}

impl PresenceSnapshot {
    /// Whether `peer` is present.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.members.contains(peer)
    }

    /// Number of present peers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is present.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Who is connected.
///
/// Joins are counted per peer. A peer is present while it has more
/// `Joined` than `Left` events, so when a client reconnects before its old
/// session has expired, the old session's `Left` does not evict the new
/// one. A `Left` with no matching join is ignored.
#[derive(Debug, Default)]
pub struct PresenceTable {
    members: HashMap<PeerId, Presence>,
    joins: u64,
    leaves: u64,
}

impl PresenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    pub fn apply(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Joined(peer) => {
                self.joins += 1;
                match self.members.get_mut(&peer) {
                    Some(presence) => {
                        presence.sessions += 1;
                        tracing::warn!(
                            %peer,
                            sessions = presence.sessions,
                            "peer joined while already present"
                        );
                    }
                    None => {
                        let presence = Presence {
                            since: Instant::now(),
                            sessions: 1,
                        };
                        self.members.insert(peer.clone(), presence);
                        tracing::info!(%peer, online = self.members.len(), "peer joined");
                    }
                }
            }
            PresenceEvent::Left(peer) => {
                self.leaves += 1;
                let Some(presence) = self.members.get_mut(&peer) else {
                    tracing::warn!(%peer, "leave for a peer that is not present");
                    return;
                };
                presence.sessions -= 1;
                if presence.sessions > 0 {
                    tracing::debug!(
                        %peer,
                        sessions = presence.sessions,
                        "one of several sessions left"
                    );
                    return;
                }
                let since = presence.since;
                self.members.remove(&peer);
                tracing::info!(
                    %peer,
                    connected_for = ?since.elapsed(),
                    online = self.members.len(),
                    "peer left"
                );
            }
        }
    }

    /// Whether `peer` is present.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.members.contains_key(peer)
    }

    /// Number of present peers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is present.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copies the current state out.
    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            members: self.members.keys().cloned().collect(),
            joins: self.joins,
            leaves: self.leaves,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(id: &str) -> PresenceEvent {
        PresenceEvent::Joined(PeerId::from(id))
    }

    fn left(id: &str) -> PresenceEvent {
        PresenceEvent::Left(PeerId::from(id))
    }

    /// Reference model: a peer is present while its joins outnumber its
    /// leaves, and a leave with nothing to match is dropped.
    fn expected_members(events: &[PresenceEvent]) -> BTreeSet<PeerId> {
        let mut open: HashMap<&PeerId, u32> = HashMap::new();
        for event in events {
            let count = open.entry(event.peer()).or_default();
            match event {
                PresenceEvent::Joined(_) => *count += 1,
                PresenceEvent::Left(_) => *count = count.saturating_sub(1),
            }
        }
        open.into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    #[test]
    fn test_join_then_leave() {
        let mut table = PresenceTable::new();
        table.apply(joined("a"));
        assert!(table.contains(&PeerId::from("a")));
        table.apply(left("a"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_identifier_reusable_after_leave() {
        let mut table = PresenceTable::new();
        table.apply(joined("a"));
        table.apply(left("a"));
        table.apply(joined("a"));
        assert!(table.contains(&PeerId::from("a")));
        let snap = table.snapshot();
        assert_eq!((snap.joins, snap.leaves), (2, 1));
    }

    #[test]
    fn test_leave_for_unknown_peer_is_ignored() {
        let mut table = PresenceTable::new();
        table.apply(left("ghost"));
        assert!(table.is_empty());
        assert_eq!(table.snapshot().leaves, 1);
    }

    #[test]
    fn test_stale_leave_keeps_newer_session_present() {
        let mut table = PresenceTable::new();
        table.apply(joined("9"));
        // Reconnect before the first session has expired.
        table.apply(joined("9"));
        table.apply(left("9"));
        assert!(table.contains(&PeerId::from("9")));

        table.apply(left("9"));
        assert!(table.is_empty());
        let snap = table.snapshot();
        assert_eq!((snap.joins, snap.leaves), (2, 2));
    }

    #[test]
    fn test_unmatched_leave_does_not_cancel_later_join() {
        let mut table = PresenceTable::new();
        table.apply(left("a"));
        table.apply(joined("a"));
        assert!(table.contains(&PeerId::from("a")));
    }

    #[test]
    fn test_membership_matches_open_session_count() {
        // Interleavings of several peers' events, as they might arrive.
        let sequences = vec![
            vec![joined("a"), joined("b"), left("a"), joined("c")],
            vec![joined("a"), left("a"), joined("a"), left("a")],
            vec![joined("a"), joined("a"), left("a")],
            vec![joined("b"), joined("a"), left("b"), left("a"), joined("b")],
            vec![left("x"), joined("x")],
            vec![joined("a"), joined("a"), left("a"), left("a"), left("a")],
            vec![joined("a"), joined("a"), left("a"), joined("a"), left("a")],
        ];

        for events in sequences {
            let mut table = PresenceTable::new();
            for event in events.clone() {
                table.apply(event);
            }
            assert_eq!(
                table.snapshot().members,
                expected_members(&events),
                "events: {events:?}"
            );
        }
    }
}
