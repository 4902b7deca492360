//! Wire protocol: constants, reply codes, and frame encoding
//!
//! The protocol is deliberately small. Every unit on the wire is a
//! length-prefixed byte string:
//!
//! ```text
//! Client → server (participant registering / observer attaching):
//!   u8 length (1-10), then that many username bytes
//! Client → server (participant active):
//!   u16 BE length (<= 1000), then that many payload bytes
//! Server → observer:
//!   u16 BE length (<= 1014), then that many formatted text bytes
//! ```
//!
//! Single-byte replies carry registration and handshake outcomes:
//! `Y` accepted, `N` rejected, `T` taken.

pub mod framer;

pub use framer::{FrameShape, Framer};

use bytes::{BufMut, Bytes, BytesMut};

/// Maximum username length in bytes
pub const MAX_USERNAME_LEN: usize = 10;

/// Maximum chat payload length in bytes
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Width usernames are padded to in public message lines
pub const NAME_PAD_WIDTH: usize = 11;

/// Maximum outbound observer frame length:
/// `'>'` + padded name + `": "` + payload
pub const MAX_BROADCAST_LEN: usize = 1 + NAME_PAD_WIDTH + 2 + MAX_MESSAGE_LEN;

/// Accepted / registered / attached
pub const REPLY_YES: u8 = b'Y';
/// Rejected: capacity, invalid name, or no such target
pub const REPLY_NO: u8 = b'N';
/// Name taken / target already observed
pub const REPLY_TAKEN: u8 = b'T';

/// Encode an outbound observer frame: u16 BE length prefix plus text.
///
/// Text longer than `MAX_BROADCAST_LEN` cannot be produced by the router
/// (payloads are bounded at `MAX_MESSAGE_LEN` before formatting), so the
/// length always fits in the prefix.
pub fn encode_frame(text: &[u8]) -> Bytes {
    debug_assert!(text.len() <= MAX_BROADCAST_LEN);
    let mut buf = BytesMut::with_capacity(2 + text.len());
    buf.put_u16(text.len() as u16);
    buf.put_slice(text);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_prefixes_length() {
        let frame = encode_frame(b"hello");
        assert_eq!(&frame[..], &[0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_encode_empty_frame() {
        let frame = encode_frame(b"");
        assert_eq!(&frame[..], &[0x00, 0x00]);
    }

    #[test]
    fn test_broadcast_bound() {
        assert_eq!(MAX_BROADCAST_LEN, 1014);
    }
}
