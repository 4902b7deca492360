//! Broker accept loops
//!
//! Binds the participant and observer listeners and spawns one driver task
//! per accepted connection. The listening socket a connection arrives on is
//! what classifies its role; payload bytes never do.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::error::{ConnectionError, Result};
use crate::registry::Registry;
use crate::router::Router;
use crate::server::config::ServerConfig;
use crate::server::connection::{ObserverConn, ParticipantConn};
use crate::session::ConnectionRole;
use crate::stats::{BrokerStats, StatsSnapshot};

/// The chat broker
pub struct ChatServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    router: Arc<Router>,
    stats: Arc<BrokerStats>,
    participant_listener: TcpListener,
    observer_listener: TcpListener,
    next_session_id: AtomicU64,
}

impl ChatServer {
    /// Bind both listeners and construct the broker.
    ///
    /// Binding is separate from running so callers can bind port 0 and
    /// query the assigned addresses before connecting clients.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let participant_listener = TcpListener::bind(config.participant_addr).await?;
        let observer_listener = TcpListener::bind(config.observer_addr).await?;

        let registry = Arc::new(Registry::with_capacity(config.capacity));
        let stats = Arc::new(BrokerStats::new());
        let router = Arc::new(Router::new(Arc::clone(&registry), Arc::clone(&stats)));

        tracing::info!(
            participants = %participant_listener.local_addr()?,
            observers = %observer_listener.local_addr()?,
            capacity = config.capacity,
            "Chat broker listening"
        );

        Ok(Self {
            config,
            registry,
            router,
            stats,
            participant_listener,
            observer_listener,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Address the participant listener is bound to
    pub fn participant_addr(&self) -> io::Result<SocketAddr> {
        self.participant_listener.local_addr()
    }

    /// Address the observer listener is bound to
    pub fn observer_addr(&self) -> io::Result<SocketAddr> {
        self.observer_listener.local_addr()
    }

    /// Shared participant registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Current broker counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run both accept loops until the process is stopped
    pub async fn run(&self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.participant_listener.accept() => {
                    self.dispatch(accepted, ConnectionRole::Participant);
                }
                accepted = self.observer_listener.accept() => {
                    self.dispatch(accepted, ConnectionRole::Observer);
                }
            }
        }
    }

    /// Run the accept loops until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run() => result,
        }
    }

    fn dispatch(&self, accepted: io::Result<(TcpStream, SocketAddr)>, role: ConnectionRole) {
        let (socket, peer_addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                return;
            }
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        BrokerStats::incr(&self.stats.connections_accepted);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            role = ?role,
            "New connection"
        );

        let registry = Arc::clone(&self.registry);
        let router = Arc::clone(&self.router);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let result = match role {
                ConnectionRole::Participant => {
                    ParticipantConn::new(session_id, socket, peer_addr, registry, router, stats)
                        .run()
                        .await
                }
                ConnectionRole::Observer => {
                    ObserverConn::new(session_id, socket, peer_addr, registry, router, stats)
                        .run()
                        .await
                }
            };

            match result {
                Ok(()) | Err(ConnectionError::PeerDisconnected) => {
                    tracing::debug!(session_id = session_id, "Connection closed");
                }
                Err(e) => {
                    tracing::debug!(session_id = session_id, error = %e, "Connection ended");
                }
            }
        });
    }
}
