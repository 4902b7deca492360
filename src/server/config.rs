//! Server configuration

use std::net::SocketAddr;

use crate::registry::DEFAULT_CAPACITY;

/// Broker configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the participant listener binds to
    pub participant_addr: SocketAddr,

    /// Address the observer listener binds to
    pub observer_addr: SocketAddr,

    /// Maximum concurrent participants (slot table size)
    pub capacity: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            participant_addr: "0.0.0.0:4000".parse().unwrap(),
            observer_addr: "0.0.0.0:4001".parse().unwrap(),
            capacity: DEFAULT_CAPACITY,
            tcp_nodelay: true, // chat frames are tiny; don't batch them
        }
    }
}

impl ServerConfig {
    /// Create a config with the given listen addresses
    pub fn with_addrs(participant_addr: SocketAddr, observer_addr: SocketAddr) -> Self {
        Self {
            participant_addr,
            observer_addr,
            ..Default::default()
        }
    }

    /// Set the participant listen address
    pub fn participant_bind(mut self, addr: SocketAddr) -> Self {
        self.participant_addr = addr;
        self
    }

    /// Set the observer listen address
    pub fn observer_bind(mut self, addr: SocketAddr) -> Self {
        self.observer_addr = addr;
        self
    }

    /// Set the participant capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set TCP_NODELAY behavior
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
