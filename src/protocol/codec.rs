//! Frame encoding
//!
//! Every frame starts with a big-endian `u16` giving the number of bytes that
//! follow. A zero length is a PING. Otherwise a type byte and a big-endian
//! topic follow, and PUB frames carry the payload in the remaining
//! `size - 3` bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::message::{MessageType, Topic};
use crate::utils::error::ProtocolError;

/// Width of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Type byte plus topic, the smallest body a non-PING frame can declare.
pub const HEADER_LEN: usize = 3;

/// Largest payload a single PUB frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - HEADER_LEN;

static PING: [u8; 2] = [0, 0];

pub fn ping_frame() -> Bytes {
    Bytes::from_static(&PING)
}

/// SUB/UNSUB acknowledgement: `size=3, type, topic`.
pub fn ack_frame(kind: MessageType, topic: Topic) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + HEADER_LEN);
    buf.put_u16(HEADER_LEN as u16);
    buf.put_u8(kind.as_byte());
    buf.put_u16(topic);
    buf.freeze()
}

pub fn publish_frame(topic: Topic, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }
    let size = HEADER_LEN + payload.len();
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + size);
    buf.put_u16(size as u16);
    buf.put_u8(MessageType::Pub.as_byte());
    buf.put_u16(topic);
    buf.put_slice(payload);
    Ok(buf.freeze())
}
