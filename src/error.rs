//! Error types for broker connections
//!
//! Everything here is handled locally by the connection that caused it:
//! a violation or I/O failure tears down that one peer and its cleanup
//! cascade, never the server. Only listener-level failures escape
//! `ChatServer::run`.

use std::io;

/// Convenience result type for connection drivers
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Error type for a single connection's lifetime
#[derive(Debug)]
pub enum ConnectionError {
    /// Underlying socket I/O failed (read or write)
    Io(io::Error),
    /// Rejected at accept because the slot table is full
    CapacityExceeded,
    /// Peer sent something the protocol forbids
    Violation(ProtocolViolation),
    /// Peer closed its end (EOF)
    PeerDisconnected,
}

/// Protocol violations that force a disconnect of the offending peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Declared frame length exceeds the bound for its shape
    OversizedFrame { declared: usize, max: usize },
    /// Private message header with no space after the target name
    MalformedPrivate,
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectionError::CapacityExceeded => write!(f, "Slot table at capacity"),
            ConnectionError::Violation(v) => write!(f, "Protocol violation: {}", v),
            ConnectionError::PeerDisconnected => write!(f, "Peer disconnected"),
        }
    }
}

impl std::fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolViolation::OversizedFrame { declared, max } => {
                write!(f, "declared frame length {} exceeds bound {}", declared, max)
            }
            ProtocolViolation::MalformedPrivate => {
                write!(f, "private message missing space after target name")
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl From<ProtocolViolation> for ConnectionError {
    fn from(v: ProtocolViolation) -> Self {
        ConnectionError::Violation(v)
    }
}
