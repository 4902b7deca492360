//! Session state tracking
//!
//! One session per accepted connection, participant or observer. The
//! connection drivers in `server::connection` own a session and advance it
//! as frames arrive; the state machines themselves hold no I/O.

pub mod state;

pub use state::{
    ConnectionRole, ObserverPhase, ObserverSession, ParticipantPhase, ParticipantSession,
};
