//! Registry implementation
//!
//! The authoritative table of participants and their attached observers.
//! Fixed-capacity arena of optional entries, indexed by `SlotId`, behind a
//! single mutex. Every operation takes the lock exactly once, so username
//! validation is linearized with promotion (two racing claims cannot both
//! win a name) and a broadcast is one atomic pass over the seats: no attach
//! or detach lands mid-fan-out.
//!
//! Nothing here blocks beyond the lock itself; observer delivery goes
//! through unbounded channels, never the observer's socket.

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use super::entry::{ObserverSeat, ParticipantEntry, ParticipantState, SlotId};

/// Default slot capacity
pub const DEFAULT_CAPACITY: usize = 255;

/// Outcome of a username claim
#[derive(Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Name accepted; the slot is now Active
    Accepted,
    /// Name has illegal characters or length; the client may retry
    Invalid,
    /// Name belongs to another active participant
    Taken,
}

/// Outcome of an observer attach attempt
#[derive(Debug)]
pub enum AttachOutcome {
    /// Attached; the receiver drains broadcast frames for this observer
    Attached {
        slot: SlotId,
        rx: mpsc::UnboundedReceiver<Bytes>,
    },
    /// No active participant has that name
    NoSuchTarget,
    /// The target already has an observer
    AlreadyObserved,
}

/// What `remove` found in the freed slot
#[derive(Debug)]
pub struct RemovedParticipant {
    /// Username if the participant had completed registration
    pub username: Option<String>,
    /// Whether an observer was forcibly detached by the removal
    pub had_observer: bool,
}

/// Point-in-time registry counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Occupied slots (registering + active)
    pub participants: usize,
    /// Participants that have completed registration
    pub active: usize,
    /// Attached observers
    pub observers: usize,
}

struct SlotTable {
    slots: Vec<Option<ParticipantEntry>>,
    occupied: usize,
}

/// Central registry of participants and observer seats
pub struct Registry {
    table: Mutex<SlotTable>,
    capacity: usize,
}

impl Registry {
    /// Create a registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a registry holding at most `capacity` participants
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            table: Mutex::new(SlotTable { slots, occupied: 0 }),
            capacity,
        }
    }

    /// Slot capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the table has no free slots left
    pub async fn at_capacity(&self) -> bool {
        let table = self.table.lock().await;
        table.occupied >= self.capacity
    }

    /// Reserve a slot for a freshly accepted participant connection.
    ///
    /// Returns `None` at capacity, with no table mutation.
    pub async fn admit(&self, session_id: u64) -> Option<SlotId> {
        let mut table = self.table.lock().await;
        if table.occupied >= self.capacity {
            return None;
        }

        let slot = table.slots.iter().position(|s| s.is_none())?;
        table.slots[slot] = Some(ParticipantEntry::new(session_id));
        table.occupied += 1;

        tracing::debug!(session_id = session_id, slot = slot, "Participant admitted");
        Some(slot)
    }

    /// Claim a username for a registering slot.
    ///
    /// Validation, the collision scan, and promotion all happen under one
    /// lock acquisition. On `Accepted` the slot is Active and observable.
    pub async fn claim(&self, slot: SlotId, name: &str) -> ClaimOutcome {
        if !valid_username(name.as_bytes()) {
            return ClaimOutcome::Invalid;
        }

        let mut table = self.table.lock().await;

        let collision = table
            .slots
            .iter()
            .flatten()
            .any(|entry| entry.has_name(name.as_bytes()));
        if collision {
            return ClaimOutcome::Taken;
        }

        let Some(entry) = table.slots.get_mut(slot).and_then(Option::as_mut) else {
            tracing::warn!(slot = slot, "Claim against a freed slot");
            return ClaimOutcome::Invalid;
        };
        if entry.is_active() {
            tracing::warn!(slot = slot, "Claim against an already active slot");
            return ClaimOutcome::Invalid;
        }

        entry.username = Some(name.to_string());
        entry.state = ParticipantState::Active;

        tracing::info!(slot = slot, username = name, "Participant registered");
        ClaimOutcome::Accepted
    }

    /// Free a participant's slot.
    ///
    /// Drops any attached seat, which closes the observer's frame channel
    /// and drives that observer connection to its own shutdown. Idempotent:
    /// removing an already freed slot returns `None`.
    pub async fn remove(&self, slot: SlotId) -> Option<RemovedParticipant> {
        let mut table = self.table.lock().await;

        let entry = table.slots.get_mut(slot)?.take()?;
        table.occupied -= 1;

        tracing::info!(
            slot = slot,
            username = entry.username.as_deref().unwrap_or(""),
            "Participant removed"
        );

        Some(RemovedParticipant {
            username: entry.username,
            had_observer: entry.observer.is_some(),
        })
    }

    /// Attach an observer to the named participant.
    ///
    /// Only Active participants can be observed; a registering one is
    /// invisible here. The registry creates the frame channel and keeps the
    /// sending half as the seat.
    pub async fn attach(&self, target: &[u8], session_id: u64) -> AttachOutcome {
        let mut table = self.table.lock().await;

        for (slot, occupant) in table.slots.iter_mut().enumerate() {
            let Some(entry) = occupant else { continue };
            if !entry.has_name(target) {
                continue;
            }

            if entry.observer.is_some() {
                return AttachOutcome::AlreadyObserved;
            }

            let (seat, rx) = ObserverSeat::new(session_id);
            entry.observer = Some(seat);

            tracing::info!(
                slot = slot,
                observer_session = session_id,
                "Observer attached"
            );
            return AttachOutcome::Attached { slot, rx };
        }

        AttachOutcome::NoSuchTarget
    }

    /// Clear a participant's observer seat.
    ///
    /// Guarded by the observer's session id so a stale disconnect cannot
    /// evict a newer occupant. Idempotent.
    pub async fn detach(&self, slot: SlotId, session_id: u64) {
        let mut table = self.table.lock().await;

        if let Some(entry) = table.slots.get_mut(slot).and_then(Option::as_mut) {
            if entry
                .observer
                .as_ref()
                .is_some_and(|seat| seat.session_id == session_id)
            {
                entry.observer = None;
                tracing::info!(
                    slot = slot,
                    observer_session = session_id,
                    "Observer detached"
                );
            }
        }
    }

    /// Deliver one frame to every attached observer.
    ///
    /// One atomic pass over the seats while the table is locked. A seat
    /// whose channel has closed is cleared in place; the failure never stops
    /// delivery to the rest. Returns the number of observers reached.
    pub async fn broadcast(&self, frame: Bytes) -> usize {
        let mut table = self.table.lock().await;
        let mut delivered = 0;

        for entry in table.slots.iter_mut().flatten() {
            if let Some(seat) = &entry.observer {
                if seat.send(frame.clone()) {
                    delivered += 1;
                } else {
                    tracing::debug!(
                        observer_session = seat.session_id,
                        "Observer channel closed during broadcast"
                    );
                    entry.observer = None;
                }
            }
        }

        delivered
    }

    /// Deliver one frame to a single participant's observer, if attached.
    ///
    /// Returns whether the frame was queued. A participant with no observer
    /// is a silent drop.
    pub async fn send_to_observer(&self, slot: SlotId, frame: Bytes) -> bool {
        let mut table = self.table.lock().await;

        let Some(entry) = table.slots.get_mut(slot).and_then(Option::as_mut) else {
            return false;
        };
        let Some(seat) = &entry.observer else {
            return false;
        };

        if seat.send(frame) {
            true
        } else {
            entry.observer = None;
            false
        }
    }

    /// Look up an active participant by name
    pub async fn find_active(&self, name: &[u8]) -> Option<SlotId> {
        let table = self.table.lock().await;
        table
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.has_name(name)))
    }

    /// Current participant/observer counts
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let table = self.table.lock().await;
        let mut active = 0;
        let mut observers = 0;
        for entry in table.slots.iter().flatten() {
            if entry.is_active() {
                active += 1;
            }
            if entry.observer.is_some() {
                observers += 1;
            }
        }
        RegistrySnapshot {
            participants: table.occupied,
            active,
            observers,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Username charset/length check: 1-10 bytes, ASCII alphanumeric or `_`.
///
/// Pure; rejection has no side effect on the table.
pub fn valid_username(name: &[u8]) -> bool {
    !name.is_empty()
        && name.len() <= crate::protocol::MAX_USERNAME_LEN
        && name.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_username() {
        assert!(valid_username(b"alice"));
        assert!(valid_username(b"a"));
        assert!(valid_username(b"user_42"));
        assert!(valid_username(b"0123456789"));

        assert!(!valid_username(b""));
        assert!(!valid_username(b"0123456789a")); // 11 bytes
        assert!(!valid_username(b"al ice"));
        assert!(!valid_username(b"al-ice"));
        assert!(!valid_username("caf\u{e9}".as_bytes()));
    }

    #[tokio::test]
    async fn test_admit_and_claim() {
        let registry = Registry::new();

        let slot = registry.admit(1).await.unwrap();
        assert_eq!(registry.claim(slot, "alice").await, ClaimOutcome::Accepted);

        let snap = registry.snapshot().await;
        assert_eq!(snap.participants, 1);
        assert_eq!(snap.active, 1);
    }

    #[tokio::test]
    async fn test_claim_rejects_invalid_and_taken() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();
        let b = registry.admit(2).await.unwrap();

        assert_eq!(registry.claim(a, "bad name").await, ClaimOutcome::Invalid);
        assert_eq!(registry.claim(a, "").await, ClaimOutcome::Invalid);
        assert_eq!(registry.claim(a, "alice").await, ClaimOutcome::Accepted);

        // Second active participant cannot take the same name
        assert_eq!(registry.claim(b, "alice").await, ClaimOutcome::Taken);
        // But can retry with a free one
        assert_eq!(registry.claim(b, "bob").await, ClaimOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_name_reusable_after_remove() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();
        registry.claim(a, "alice").await;
        let removed = registry.remove(a).await.unwrap();
        assert_eq!(removed.username.as_deref(), Some("alice"));

        let b = registry.admit(2).await.unwrap();
        assert_eq!(registry.claim(b, "alice").await, ClaimOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_registering_name_does_not_collide() {
        let registry = Registry::new();

        // A slot that merely reserved space has no claim on any name
        let _a = registry.admit(1).await.unwrap();
        let b = registry.admit(2).await.unwrap();
        assert_eq!(registry.claim(b, "alice").await, ClaimOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_capacity_rejects_admit() {
        let registry = Registry::with_capacity(2);

        assert!(registry.admit(1).await.is_some());
        assert!(registry.admit(2).await.is_some());
        assert!(registry.at_capacity().await);
        assert!(registry.admit(3).await.is_none());

        // Rejection left the table untouched
        assert_eq!(registry.snapshot().await.participants, 2);
    }

    #[tokio::test]
    async fn test_slot_reuse_after_remove() {
        let registry = Registry::with_capacity(1);

        let a = registry.admit(1).await.unwrap();
        assert!(registry.admit(2).await.is_none());

        registry.remove(a).await;
        assert!(registry.admit(3).await.is_some());
    }

    #[tokio::test]
    async fn test_attach_outcomes() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();

        // Registering participants are invisible to observers
        assert!(matches!(
            registry.attach(b"alice", 10).await,
            AttachOutcome::NoSuchTarget
        ));

        registry.claim(a, "alice").await;
        assert!(matches!(
            registry.attach(b"alice", 10).await,
            AttachOutcome::Attached { slot, .. } if slot == a
        ));

        // One observer per participant
        assert!(matches!(
            registry.attach(b"alice", 11).await,
            AttachOutcome::AlreadyObserved
        ));
    }

    #[tokio::test]
    async fn test_detach_requires_matching_session() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();
        registry.claim(a, "alice").await;
        let AttachOutcome::Attached { slot, .. } = registry.attach(b"alice", 10).await else {
            panic!("attach failed");
        };

        // Stale session id must not evict the current occupant
        registry.detach(slot, 99).await;
        assert_eq!(registry.snapshot().await.observers, 1);

        registry.detach(slot, 10).await;
        assert_eq!(registry.snapshot().await.observers, 0);

        // Idempotent
        registry.detach(slot, 10).await;
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_seats() {
        let registry = Registry::new();

        for (i, name) in ["alice", "bob"].iter().enumerate() {
            let slot = registry.admit(i as u64).await.unwrap();
            registry.claim(slot, name).await;
        }

        let AttachOutcome::Attached { mut rx, .. } = registry.attach(b"alice", 10).await else {
            panic!("attach failed");
        };
        let AttachOutcome::Attached { rx: mut rx2, .. } = registry.attach(b"bob", 11).await else {
            panic!("attach failed");
        };

        let delivered = registry.broadcast(Bytes::from_static(b"notice")).await;
        assert_eq!(delivered, 2);
        assert_eq!(&rx.recv().await.unwrap()[..], b"notice");
        assert_eq!(&rx2.recv().await.unwrap()[..], b"notice");
    }

    #[tokio::test]
    async fn test_broadcast_clears_dead_seat_without_aborting() {
        let registry = Registry::new();

        for (i, name) in ["alice", "bob"].iter().enumerate() {
            let slot = registry.admit(i as u64).await.unwrap();
            registry.claim(slot, name).await;
        }

        let AttachOutcome::Attached { rx, .. } = registry.attach(b"alice", 10).await else {
            panic!("attach failed");
        };
        let AttachOutcome::Attached { rx: mut live_rx, .. } = registry.attach(b"bob", 11).await
        else {
            panic!("attach failed");
        };

        // Alice's observer went away without detaching
        drop(rx);

        let delivered = registry.broadcast(Bytes::from_static(b"still here")).await;
        assert_eq!(delivered, 1);
        assert_eq!(&live_rx.recv().await.unwrap()[..], b"still here");

        // The dead seat was cleared, freeing alice for a new observer
        assert!(matches!(
            registry.attach(b"alice", 12).await,
            AttachOutcome::Attached { .. }
        ));
    }

    #[tokio::test]
    async fn test_remove_forces_observer_channel_closed() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();
        registry.claim(a, "alice").await;
        let AttachOutcome::Attached { mut rx, .. } = registry.attach(b"alice", 10).await else {
            panic!("attach failed");
        };

        let removed = registry.remove(a).await.unwrap();
        assert!(removed.had_observer);

        // Seat dropped with the entry; the observer sees end-of-stream
        assert!(rx.recv().await.is_none());
        assert!(registry.find_active(b"alice").await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_observer_silent_without_seat() {
        let registry = Registry::new();

        let a = registry.admit(1).await.unwrap();
        registry.claim(a, "bob").await;

        // No observer attached: frame is dropped, not an error
        assert!(!registry.send_to_observer(a, Bytes::from_static(b"x")).await);
    }
}
