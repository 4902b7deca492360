//! Message routing
//!
//! Turns an inbound participant payload into formatted outbound frames and
//! hands them to the registry for delivery. Two paths:
//!
//! - public: `>{name right-justified to 11}: {body}` to every attached
//!   observer,
//! - private (`@target body`): `-{name}: {body}` to the target's observer
//!   and echoed to the sender's own observer; a missing target turns into a
//!   warning frame for the sender's observer only.
//!
//! System notices (joins, leaves, observer arrivals) ride the public path
//! as bare text.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::error::{ConnectionError, ProtocolViolation};
use crate::protocol::{encode_frame, NAME_PAD_WIDTH};
use crate::registry::{Registry, SlotId};
use crate::stats::BrokerStats;

/// Routes participant payloads and system notices to observers
pub struct Router {
    registry: Arc<Registry>,
    stats: Arc<BrokerStats>,
}

impl Router {
    /// Create a router over the given registry
    pub fn new(registry: Arc<Registry>, stats: Arc<BrokerStats>) -> Self {
        Self { registry, stats }
    }

    /// Route one payload frame published by an active participant.
    ///
    /// `username` is the sender's registered name, `slot` its registry slot.
    /// A private payload with no space after the target name is a protocol
    /// violation and disconnects the sender.
    pub async fn publish(
        &self,
        slot: SlotId,
        username: &str,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        if payload.first() == Some(&b'@') {
            self.publish_private(slot, username, &payload[1..]).await
        } else {
            self.publish_public(username, payload).await
        }
    }

    async fn publish_public(&self, username: &str, body: &[u8]) -> Result<(), ConnectionError> {
        let frame = encode_frame(&public_line(username, body));
        let delivered = self.registry.broadcast(frame).await;

        BrokerStats::incr(&self.stats.public_messages);
        BrokerStats::add(&self.stats.frames_delivered, delivered as u64);

        tracing::debug!(sender = username, delivered = delivered, "Public message");
        Ok(())
    }

    async fn publish_private(
        &self,
        slot: SlotId,
        username: &str,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        // Target name runs from just after '@' to the first space
        let Some(sep) = payload.iter().position(|b| *b == b' ') else {
            return Err(ProtocolViolation::MalformedPrivate.into());
        };
        let target = &payload[..sep];
        let body = &payload[sep + 1..];

        BrokerStats::incr(&self.stats.private_messages);

        match self.registry.find_active(target).await {
            Some(target_slot) => {
                let frame = encode_frame(&private_line(username, body));

                let mut delivered = 0u64;
                // Target with no observer is a silent drop
                if self.registry.send_to_observer(target_slot, frame.clone()).await {
                    delivered += 1;
                }
                // The sender sees their own private message
                if self.registry.send_to_observer(slot, frame).await {
                    delivered += 1;
                }
                BrokerStats::add(&self.stats.frames_delivered, delivered);

                tracing::debug!(
                    sender = username,
                    target = %String::from_utf8_lossy(target),
                    delivered = delivered,
                    "Private message"
                );
            }
            None => {
                let warning = warning_line(target);
                if self.registry.send_to_observer(slot, encode_frame(&warning)).await {
                    BrokerStats::add(&self.stats.frames_delivered, 1);
                }

                tracing::debug!(
                    sender = username,
                    target = %String::from_utf8_lossy(target),
                    "Private message to nonexistent user"
                );
            }
        }

        Ok(())
    }

    /// Broadcast a system notice to every attached observer
    pub async fn notice(&self, text: &str) {
        let delivered = self.registry.broadcast(encode_frame(text.as_bytes())).await;
        BrokerStats::add(&self.stats.frames_delivered, delivered as u64);

        tracing::debug!(notice = text, delivered = delivered, "System notice");
    }
}

/// `>{name right-justified to 11}: {body}`
fn public_line(username: &str, body: &[u8]) -> BytesMut {
    let mut line = BytesMut::with_capacity(1 + NAME_PAD_WIDTH + 2 + body.len());
    line.put_u8(b'>');
    for _ in username.len()..NAME_PAD_WIDTH {
        line.put_u8(b' ');
    }
    line.put_slice(username.as_bytes());
    line.put_slice(b": ");
    line.put_slice(body);
    line
}

/// `-{name}: {body}`
fn private_line(username: &str, body: &[u8]) -> BytesMut {
    let mut line = BytesMut::with_capacity(1 + username.len() + 2 + body.len());
    line.put_u8(b'-');
    line.put_slice(username.as_bytes());
    line.put_slice(b": ");
    line.put_slice(body);
    line
}

/// `Warning: user {target} doesn't exist...`
///
/// The quoted target is capped at the username bound; anything longer can
/// never name a participant, and the cap keeps every outbound frame inside
/// the observer-stream length limit.
fn warning_line(target: &[u8]) -> BytesMut {
    let target = &target[..target.len().min(crate::protocol::MAX_USERNAME_LEN)];
    let mut line = BytesMut::with_capacity(32 + target.len());
    line.put_slice(b"Warning: user ");
    line.put_slice(target);
    line.put_slice(b" doesn't exist...");
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AttachOutcome;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn router() -> (Router, Arc<Registry>, Arc<BrokerStats>) {
        let registry = Arc::new(Registry::new());
        let stats = Arc::new(BrokerStats::new());
        (
            Router::new(Arc::clone(&registry), Arc::clone(&stats)),
            registry,
            stats,
        )
    }

    async fn active(registry: &Registry, session_id: u64, name: &str) -> SlotId {
        let slot = registry.admit(session_id).await.unwrap();
        registry.claim(slot, name).await;
        slot
    }

    async fn observe(registry: &Registry, name: &str, session_id: u64) -> mpsc::UnboundedReceiver<Bytes> {
        match registry.attach(name.as_bytes(), session_id).await {
            AttachOutcome::Attached { rx, .. } => rx,
            other => panic!("attach failed: {:?}", other),
        }
    }

    #[test]
    fn test_public_line_padding() {
        assert_eq!(&public_line("alice", b"hi")[..], b">      alice: hi");
        assert_eq!(&public_line("a", b"x")[..], b">          a: x");
        // A max-length name consumes nearly the whole field
        assert_eq!(&public_line("abcdefghij", b"x")[..], b"> abcdefghij: x");
    }

    #[test]
    fn test_private_line_unpadded() {
        assert_eq!(&private_line("alice", b"hello")[..], b"-alice: hello");
    }

    #[test]
    fn test_warning_line() {
        assert_eq!(
            &warning_line(b"carol")[..],
            b"Warning: user carol doesn't exist..."
        );
    }

    #[test]
    fn test_warning_line_caps_oversized_target() {
        assert_eq!(
            &warning_line(b"waytoolongname")[..],
            b"Warning: user waytoolong doesn't exist..."
        );
    }

    #[tokio::test]
    async fn test_public_round_trip_bytes() {
        let (router, registry, _stats) = router();
        let alice = active(&registry, 1, "alice").await;
        let mut rx = observe(&registry, "alice", 10).await;

        router.publish(alice, "alice", b"hi").await.unwrap();

        let frame = rx.recv().await.unwrap();
        // 2-byte BE length prefix covering the formatted line
        assert_eq!(&frame[..2], &16u16.to_be_bytes());
        assert_eq!(&frame[2..], b">      alice: hi");
    }

    #[tokio::test]
    async fn test_public_reaches_every_observer() {
        let (router, registry, stats) = router();
        let alice = active(&registry, 1, "alice").await;
        active(&registry, 2, "bob").await;

        let mut alice_rx = observe(&registry, "alice", 10).await;
        let mut bob_rx = observe(&registry, "bob", 11).await;

        router.publish(alice, "alice", b"hey").await.unwrap();

        assert_eq!(&alice_rx.recv().await.unwrap()[2..], b">      alice: hey");
        assert_eq!(&bob_rx.recv().await.unwrap()[2..], b">      alice: hey");
        assert_eq!(stats.snapshot().frames_delivered, 2);
    }

    #[tokio::test]
    async fn test_private_echo_with_unobserved_target() {
        let (router, registry, _stats) = router();
        let alice = active(&registry, 1, "alice").await;
        active(&registry, 2, "bob").await;

        // Alice is observed, bob is not
        let mut alice_rx = observe(&registry, "alice", 10).await;

        router.publish(alice, "alice", b"@bob hello").await.unwrap();

        // Bob's (absent) observer gets nothing; alice's sees the echo
        let frame = alice_rx.recv().await.unwrap();
        assert_eq!(&frame[2..], b"-alice: hello");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_private_delivered_to_target_observer() {
        let (router, registry, _stats) = router();
        let alice = active(&registry, 1, "alice").await;
        active(&registry, 2, "bob").await;

        let mut alice_rx = observe(&registry, "alice", 10).await;
        let mut bob_rx = observe(&registry, "bob", 11).await;

        router.publish(alice, "alice", b"@bob psst").await.unwrap();

        assert_eq!(&bob_rx.recv().await.unwrap()[2..], b"-alice: psst");
        assert_eq!(&alice_rx.recv().await.unwrap()[2..], b"-alice: psst");
    }

    #[tokio::test]
    async fn test_private_to_nonexistent_warns_sender_only() {
        let (router, registry, _stats) = router();
        let alice = active(&registry, 1, "alice").await;
        active(&registry, 2, "bob").await;

        let mut alice_rx = observe(&registry, "alice", 10).await;
        let mut bob_rx = observe(&registry, "bob", 11).await;

        router.publish(alice, "alice", b"@carol hi").await.unwrap();

        assert_eq!(
            &alice_rx.recv().await.unwrap()[2..],
            b"Warning: user carol doesn't exist..."
        );
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_private_is_violation() {
        let (router, registry, _stats) = router();
        let alice = active(&registry, 1, "alice").await;

        let err = router.publish(alice, "alice", b"@bob").await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Violation(ProtocolViolation::MalformedPrivate)
        ));
    }

    #[tokio::test]
    async fn test_notice_uses_broadcast_path() {
        let (router, registry, _stats) = router();
        active(&registry, 1, "alice").await;
        let mut rx = observe(&registry, "alice", 10).await;

        router.notice("User bob has joined").await;

        assert_eq!(&rx.recv().await.unwrap()[2..], b"User bob has joined");
    }
}
