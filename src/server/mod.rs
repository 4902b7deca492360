//! Broker server: configuration, accept loops, and connection drivers

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::{ObserverConn, ParticipantConn};
pub use listener::ChatServer;
