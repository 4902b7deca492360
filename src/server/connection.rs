//! Per-connection drivers
//!
//! One task per accepted socket. A participant driver reads frames through
//! its framer and feeds the session state machine; an observer driver runs
//! an attach loop, then drains its seat's frame channel to the socket while
//! watching the socket for disconnect. All failures are local: the driver
//! tears down its own registry state and exits.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{ConnectionError, Result};
use crate::protocol::{FrameShape, Framer, REPLY_NO, REPLY_TAKEN, REPLY_YES};
use crate::registry::{AttachOutcome, ClaimOutcome, Registry};
use crate::router::Router;
use crate::session::{ObserverSession, ParticipantPhase, ParticipantSession};
use crate::stats::BrokerStats;

/// Driver for a connection accepted on the participant port
pub struct ParticipantConn {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    router: Arc<Router>,
    stats: Arc<BrokerStats>,
    framer: Framer,
}

impl ParticipantConn {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        registry: Arc<Registry>,
        router: Arc<Router>,
        stats: Arc<BrokerStats>,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            registry,
            router,
            stats,
            framer: Framer::new(),
        }
    }

    /// Run the connection to completion
    pub async fn run(mut self) -> Result<()> {
        // Handshake: a slot reservation is the capacity check
        let Some(slot) = self.registry.admit(self.session_id).await else {
            BrokerStats::incr(&self.stats.capacity_rejections);
            tracing::warn!(
                session_id = self.session_id,
                peer = %self.peer_addr,
                "Participant rejected: at capacity"
            );
            let _ = self.socket.write_all(&[REPLY_NO]).await;
            return Err(ConnectionError::CapacityExceeded);
        };

        if let Err(e) = self.socket.write_all(&[REPLY_YES]).await {
            self.registry.remove(slot).await;
            return Err(e.into());
        }

        let mut session = ParticipantSession::new(self.session_id, self.peer_addr, slot);
        let result = self.serve(&mut session).await;

        // Departure notice goes out while the slot is still present, so the
        // departing user's own observer hears it before its channel closes
        if let Some(name) = session.username.clone() {
            self.router.notice(&format!("User {} has left", name)).await;
        }
        self.registry.remove(session.slot).await;
        session.close();

        tracing::debug!(
            session_id = self.session_id,
            duration_ms = session.duration().as_millis() as u64,
            "Participant session ended"
        );

        result
    }

    async fn serve(&mut self, session: &mut ParticipantSession) -> Result<()> {
        loop {
            // Drain every complete frame before touching the socket again;
            // the expected shape can change across a promotion
            while let Some(frame) = self.framer.next_frame(session.expected_shape())? {
                self.on_frame(session, frame).await?;
            }

            let n = self.socket.read_buf(self.framer.buffer_mut()).await?;
            if n == 0 {
                return Err(ConnectionError::PeerDisconnected);
            }
        }
    }

    async fn on_frame(&mut self, session: &mut ParticipantSession, frame: Bytes) -> Result<()> {
        match session.phase {
            ParticipantPhase::Registering => self.on_username(session, &frame).await,
            ParticipantPhase::Active => {
                if let Some(name) = session.username.clone() {
                    self.router.publish(session.slot, &name, &frame).await?;
                }
                Ok(())
            }
            // serve() exits before a closed session sees another frame
            ParticipantPhase::Closed => Ok(()),
        }
    }

    async fn on_username(&mut self, session: &mut ParticipantSession, frame: &[u8]) -> Result<()> {
        // Usernames are ASCII by the charset rule, so non-UTF-8 can only be
        // an invalid name
        let outcome = match std::str::from_utf8(frame) {
            Ok(name) => {
                let outcome = self.registry.claim(session.slot, name).await;
                if outcome == ClaimOutcome::Accepted {
                    session.promote(name.to_string());
                }
                outcome
            }
            Err(_) => ClaimOutcome::Invalid,
        };

        let reply = match outcome {
            ClaimOutcome::Accepted => REPLY_YES,
            ClaimOutcome::Invalid => REPLY_NO,
            ClaimOutcome::Taken => REPLY_TAKEN,
        };
        self.socket.write_all(&[reply]).await?;

        if outcome == ClaimOutcome::Accepted {
            BrokerStats::incr(&self.stats.registrations);
            // Safe: promote just stored it
            if let Some(name) = &session.username {
                self.router
                    .notice(&format!("User {} has joined", name))
                    .await;
            }
        }

        Ok(())
    }
}

/// Driver for a connection accepted on the observer port
pub struct ObserverConn {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    router: Arc<Router>,
    stats: Arc<BrokerStats>,
    framer: Framer,
}

impl ObserverConn {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        registry: Arc<Registry>,
        router: Arc<Router>,
        stats: Arc<BrokerStats>,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            registry,
            router,
            stats,
            framer: Framer::new(),
        }
    }

    /// Run the connection to completion
    pub async fn run(mut self) -> Result<()> {
        if self.registry.at_capacity().await {
            BrokerStats::incr(&self.stats.capacity_rejections);
            tracing::warn!(
                session_id = self.session_id,
                peer = %self.peer_addr,
                "Observer rejected: at capacity"
            );
            let _ = self.socket.write_all(&[REPLY_NO]).await;
            return Err(ConnectionError::CapacityExceeded);
        }
        self.socket.write_all(&[REPLY_YES]).await?;

        let mut session = ObserverSession::new(self.session_id, self.peer_addr);

        let result = match self.attach_loop(&mut session).await {
            Ok(rx) => self.serve(rx).await,
            Err(e) => Err(e),
        };

        // Idempotent; a forced detach (participant gone) already cleared it
        if let Some(slot) = session.target {
            self.registry.detach(slot, self.session_id).await;
        }
        session.close();

        result
    }

    /// Read target-username frames until one names an observable participant
    async fn attach_loop(
        &mut self,
        session: &mut ObserverSession,
    ) -> Result<mpsc::UnboundedReceiver<Bytes>> {
        loop {
            while let Some(frame) = self.framer.next_frame(FrameShape::Username)? {
                match self.registry.attach(&frame, self.session_id).await {
                    AttachOutcome::Attached { slot, rx } => {
                        // Record the attach before the reply so a failed
                        // write still reaches the detach in cleanup
                        session.attach(slot);
                        self.socket.write_all(&[REPLY_YES]).await?;

                        BrokerStats::incr(&self.stats.attaches);
                        self.router.notice("A new observer has joined").await;
                        return Ok(rx);
                    }
                    AttachOutcome::NoSuchTarget => {
                        self.socket.write_all(&[REPLY_NO]).await?;
                    }
                    AttachOutcome::AlreadyObserved => {
                        self.socket.write_all(&[REPLY_TAKEN]).await?;
                    }
                }
            }

            let n = self.socket.read_buf(self.framer.buffer_mut()).await?;
            if n == 0 {
                return Err(ConnectionError::PeerDisconnected);
            }
        }
    }

    /// Forward broadcast frames to the socket; watch the socket for EOF
    async fn serve(&mut self, mut rx: mpsc::UnboundedReceiver<Bytes>) -> Result<()> {
        let (mut reader, mut writer) = self.socket.split();
        let mut probe = [0u8; 64];

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(bytes) => writer.write_all(&bytes).await?,
                    // Seat dropped: the followed participant is gone
                    None => return Ok(()),
                },
                read = reader.read(&mut probe) => {
                    if read? == 0 {
                        return Err(ConnectionError::PeerDisconnected);
                    }
                    // Attached observers send no frames; inbound bytes are
                    // a liveness signal only, discarded
                }
            }
        }
    }
}
