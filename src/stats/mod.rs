//! Broker-wide counters
//!
//! Cheap atomic counters bumped on the hot paths; `snapshot` is for
//! operator output (the demo server prints one on shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for the life of the broker
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Connections accepted on either port
    pub connections_accepted: AtomicU64,
    /// Connections rejected at the handshake for capacity
    pub capacity_rejections: AtomicU64,
    /// Successful username registrations
    pub registrations: AtomicU64,
    /// Successful observer attaches
    pub attaches: AtomicU64,
    /// Public messages published
    pub public_messages: AtomicU64,
    /// Private messages published (including warnings to the sender)
    pub private_messages: AtomicU64,
    /// Frames queued to observers, fan-out included
    pub frames_delivered: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub capacity_rejections: u64,
    pub registrations: u64,
    pub attaches: u64,
    pub public_messages: u64,
    pub private_messages: u64,
    pub frames_delivered: u64,
}

impl BrokerStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Copy out the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            attaches: self.attaches.load(Ordering::Relaxed),
            public_messages: self.public_messages.load(Ordering::Relaxed),
            private_messages: self.private_messages.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
        }
    }
}
