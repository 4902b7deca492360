//! Incremental length-prefixed frame parser
//!
//! TCP delivers a byte stream in arbitrary fragments: a length prefix can
//! arrive split across reads, a single read can carry several frames, and a
//! frame body can trickle in one byte at a time. The `Framer` absorbs raw
//! bytes into an internal buffer and yields complete frames one at a time,
//! retaining unfinished trailing bytes across calls. It never blocks and
//! never discards.
//!
//! A declared length over the bound for the expected shape is a protocol
//! violation; the connection is torn down rather than resynchronized, since
//! there is no way to find the next frame boundary in a desynced stream.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolViolation;
use crate::protocol::{MAX_MESSAGE_LEN, MAX_USERNAME_LEN};

/// Shape of the frame the session currently expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    /// 1-byte length prefix, username payload (registration / attach)
    Username,
    /// 2-byte big-endian length prefix, chat payload
    Chat,
}

impl FrameShape {
    /// Length prefix width in bytes
    pub fn prefix_len(self) -> usize {
        match self {
            FrameShape::Username => 1,
            FrameShape::Chat => 2,
        }
    }

    /// Maximum legal declared payload length
    pub fn max_len(self) -> usize {
        match self {
            FrameShape::Username => MAX_USERNAME_LEN,
            FrameShape::Chat => MAX_MESSAGE_LEN,
        }
    }
}

/// Incremental frame parser for one connection
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(2 + MAX_MESSAGE_LEN),
        }
    }

    /// Buffer to read socket bytes into (target for `AsyncReadExt::read_buf`)
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Append raw bytes from the stream
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to pull one complete frame of the given shape.
    ///
    /// Returns `Ok(None)` until the prefix and the declared number of body
    /// bytes have arrived. A zero-length frame is legal and yields an empty
    /// `Bytes`. Consumes nothing on `Ok(None)` and nothing on error.
    pub fn next_frame(&mut self, shape: FrameShape) -> Result<Option<Bytes>, ProtocolViolation> {
        let prefix = shape.prefix_len();
        if self.buf.len() < prefix {
            return Ok(None);
        }

        let declared = match shape {
            FrameShape::Username => self.buf[0] as usize,
            FrameShape::Chat => u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize,
        };

        if declared > shape.max_len() {
            return Err(ProtocolViolation::OversizedFrame {
                declared,
                max: shape.max_len(),
            });
        }

        if self.buf.len() < prefix + declared {
            return Ok(None);
        }

        self.buf.advance(prefix);
        Ok(Some(self.buf.split_to(declared).freeze()))
    }
}
