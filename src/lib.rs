//! chatcast: a real-time pub/sub chat broker
//!
//! Participants connect on one TCP port, register a unique username, and
//! publish length-framed text messages. Observers connect on a second port,
//! attach to exactly one participant, and receive everything that
//! participant sends plus system notices.
//!
//! # Architecture
//!
//! One tokio task per connection. The [`registry::Registry`] is the only
//! shared mutable state: a fixed-capacity slot table behind a single lock,
//! which linearizes username claims and makes every broadcast an atomic
//! pass over the attached observers. Observer sockets are fed through
//! per-observer channels, so a slow or dead observer never stalls a
//! publisher or the fan-out to its peers.
//!
//! ```no_run
//! use chatcast::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = ChatServer::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{ConnectionError, ProtocolViolation, Result};
pub use registry::Registry;
pub use router::Router;
pub use server::{ChatServer, ServerConfig};
