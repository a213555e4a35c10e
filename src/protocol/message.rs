//! Message definitions for the wire protocol
//!
//! A `Message` is one decoded protocol unit. Topics are flat 16-bit
//! identifiers; a topic only "exists" while somebody is subscribed to it.

use std::fmt;

use bytes::Bytes;

use crate::protocol::codec;
use crate::utils::error::ProtocolError;

/// Numeric channel identifier.
pub type Topic = u16;

/// Type byte carried by every non-PING frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Pub = 1,
    Sub = 2,
    Unsub = 4,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Pub),
            2 => Some(Self::Sub),
            4 => Some(Self::Unsub),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Pub => write!(f, "pub"),
            MessageType::Sub => write!(f, "sub"),
            MessageType::Unsub => write!(f, "unsub"),
        }
    }
}

/// A decoded protocol message.
///
/// The same shape is used in both directions: clients send `Sub`/`Unsub`
/// requests and the broker echoes them back as acknowledgements; published
/// payloads travel as `Pub` both ways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping,
    Sub { topic: Topic },
    Unsub { topic: Topic },
    Pub { topic: Topic, payload: Bytes },
}

impl Message {
    /// Build a `Pub` message from anything convertible into `Bytes`.
    pub fn publish(topic: Topic, payload: impl Into<Bytes>) -> Self {
        Message::Pub {
            topic,
            payload: payload.into(),
        }
    }

    /// Serialize into one wire frame, length prefix included.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Message::Ping => Ok(codec::ping_frame()),
            Message::Sub { topic } => Ok(codec::ack_frame(MessageType::Sub, *topic)),
            Message::Unsub { topic } => Ok(codec::ack_frame(MessageType::Unsub, *topic)),
            Message::Pub { topic, payload } => codec::publish_frame(*topic, payload),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Ping => write!(f, "ping"),
            Message::Sub { topic } => write!(f, "sub({topic})"),
            Message::Unsub { topic } => write!(f, "unsub({topic})"),
            Message::Pub { topic, payload } => {
                write!(f, "pub({topic}, {:?})", String::from_utf8_lossy(payload))
            }
        }
    }
}
