//! Participant slot entries and observer seats
//!
//! A slot holds one participant from accept to disconnect. The observer
//! "seat" is the registry's handle on an attached observer: an unbounded
//! sender feeding that observer's connection task. Dropping the seat closes
//! the channel, which the observer task treats as a forced detach.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Index into the registry's slot table
pub type SlotId = usize;

/// Participant lifecycle state within the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Slot reserved, username not yet confirmed
    Registering,
    /// Username claimed; can publish and be observed
    Active,
}

/// One participant's registry entry
#[derive(Debug)]
pub struct ParticipantEntry {
    /// Session id of the owning publish connection
    pub session_id: u64,

    /// Registered username (set on promotion)
    pub username: Option<String>,

    /// Current lifecycle state
    pub state: ParticipantState,

    /// Attached observer, at most one
    pub observer: Option<ObserverSeat>,
}

impl ParticipantEntry {
    /// Create a freshly admitted, unregistered entry
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            username: None,
            state: ParticipantState::Registering,
            observer: None,
        }
    }

    /// Whether this participant has completed registration
    pub fn is_active(&self) -> bool {
        self.state == ParticipantState::Active
    }

    /// Whether this participant's registered name matches `name`
    pub fn has_name(&self, name: &[u8]) -> bool {
        self.is_active()
            && self
                .username
                .as_deref()
                .is_some_and(|u| u.as_bytes() == name)
    }
}

/// Handle on an attached observer's outbound queue
#[derive(Debug)]
pub struct ObserverSeat {
    /// Session id of the observer connection occupying the seat
    pub session_id: u64,

    tx: mpsc::UnboundedSender<Bytes>,
}

impl ObserverSeat {
    /// Create a seat and the receiver half handed to the observer task
    pub fn new(session_id: u64) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { session_id, tx }, rx)
    }

    /// Queue a frame for the observer. Returns false if the observer's
    /// task has already gone away (its receiver is dropped).
    pub fn send(&self, frame: Bytes) -> bool {
        self.tx.send(frame).is_ok()
    }
}
