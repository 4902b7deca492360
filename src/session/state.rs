//! Per-connection session state machines
//!
//! Each connection advances through a small linear lifecycle depending on
//! its role, which is fixed by the listener that accepted it. The session
//! only ever consumes one complete frame at a time from the framer; which
//! frame shape it expects is a function of the current phase.

use std::net::SocketAddr;
use std::time::Instant;

use crate::protocol::FrameShape;
use crate::registry::SlotId;

/// Connection role, assigned at accept time by the listening socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Accepted on the participant port; publishes messages
    Participant,
    /// Accepted on the observer port; follows one participant
    Observer,
}

/// Participant lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantPhase {
    /// Handshake done, username not yet accepted
    Registering,
    /// Username registered; payload frames are routed
    Active,
    /// Terminal: disconnected or protocol violation
    Closed,
}

/// Observer lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPhase {
    /// Handshake done, no target accepted yet
    Attaching,
    /// Following a participant's stream
    Attached,
    /// Terminal
    Closed,
}

/// State for one participant connection
#[derive(Debug)]
pub struct ParticipantSession {
    /// Unique session id
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Registry slot reserved at accept
    pub slot: SlotId,

    /// Current phase
    pub phase: ParticipantPhase,

    /// Registered username (set on promotion)
    pub username: Option<String>,

    /// Connection start time
    pub connected_at: Instant,
}

impl ParticipantSession {
    /// Create a session for a freshly admitted participant
    pub fn new(session_id: u64, peer_addr: SocketAddr, slot: SlotId) -> Self {
        Self {
            session_id,
            peer_addr,
            slot,
            phase: ParticipantPhase::Registering,
            username: None,
            connected_at: Instant::now(),
        }
    }

    /// Frame shape the next inbound frame must have
    pub fn expected_shape(&self) -> FrameShape {
        match self.phase {
            ParticipantPhase::Registering => FrameShape::Username,
            // Closed sessions read nothing; the driver has already bailed
            ParticipantPhase::Active | ParticipantPhase::Closed => FrameShape::Chat,
        }
    }

    /// Record a successful username claim
    pub fn promote(&mut self, username: String) {
        if self.phase == ParticipantPhase::Registering {
            self.username = Some(username);
            self.phase = ParticipantPhase::Active;
        }
    }

    /// Whether registration has completed
    pub fn is_active(&self) -> bool {
        self.phase == ParticipantPhase::Active
    }

    /// Enter the terminal phase
    pub fn close(&mut self) {
        self.phase = ParticipantPhase::Closed;
    }

    /// Session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

/// State for one observer connection
#[derive(Debug)]
pub struct ObserverSession {
    /// Unique session id
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: ObserverPhase,

    /// Slot of the followed participant once attached
    pub target: Option<SlotId>,

    /// Connection start time
    pub connected_at: Instant,
}

impl ObserverSession {
    /// Create a session for a freshly accepted observer
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            phase: ObserverPhase::Attaching,
            target: None,
            connected_at: Instant::now(),
        }
    }

    /// Record a successful attach
    pub fn attach(&mut self, target: SlotId) {
        if self.phase == ObserverPhase::Attaching {
            self.target = Some(target);
            self.phase = ObserverPhase::Attached;
        }
    }

    /// Whether this observer is following a participant
    pub fn is_attached(&self) -> bool {
        self.phase == ObserverPhase::Attached
    }

    /// Enter the terminal phase
    pub fn close(&mut self) {
        self.phase = ObserverPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)
    }

    #[test]
    fn test_participant_lifecycle() {
        let mut session = ParticipantSession::new(1, addr(), 0);

        assert_eq!(session.phase, ParticipantPhase::Registering);
        assert_eq!(session.expected_shape(), FrameShape::Username);
        assert!(!session.is_active());

        session.promote("alice".into());
        assert_eq!(session.phase, ParticipantPhase::Active);
        assert_eq!(session.expected_shape(), FrameShape::Chat);
        assert_eq!(session.username.as_deref(), Some("alice"));

        // A second promotion is a no-op; re-registration is not permitted
        session.promote("bob".into());
        assert_eq!(session.username.as_deref(), Some("alice"));

        session.close();
        assert_eq!(session.phase, ParticipantPhase::Closed);
    }

    #[test]
    fn test_session_duration_advances() {
        let session = ParticipantSession::new(1, addr(), 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(session.duration() >= std::time::Duration::from_millis(5));
    }

    #[test]
    fn test_observer_lifecycle() {
        let mut session = ObserverSession::new(2, addr());

        assert_eq!(session.phase, ObserverPhase::Attaching);
        assert!(!session.is_attached());

        session.attach(3);
        assert!(session.is_attached());
        assert_eq!(session.target, Some(3));

        session.close();
        assert_eq!(session.phase, ObserverPhase::Closed);
    }
}
