//! Incremental frame decoder
//!
//! `MessageDecoder` is a finite-state machine that rebuilds `Message`s from
//! an arbitrarily fragmented byte stream. It never blocks and holds at most
//! one in-flight frame: the current stage, half of a 16-bit field and the
//! partially filled payload of a PUB.
//!
//! Malformed frames (unknown type byte, or a declared size too small for
//! the header) are reported as `Err` items. The decoder then skips the rest
//! of the offending frame, `size - 1` bytes after the type byte, and resumes
//! at the next length prefix. SUB/UNSUB frames declaring more than the
//! 3-byte header have their trailing bytes skipped the same way, so every
//! frame consumes exactly `2 + size` bytes.

use bytes::{Bytes, BytesMut};

use crate::protocol::codec::HEADER_LEN;
use crate::protocol::message::{Message, MessageType, Topic};
use crate::utils::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitLength,
    AwaitType,
    AwaitTopic(MessageType),
    AwaitPayload,
    Skip(usize),
}

/// Big-endian `u16` assembled one byte at a time.
#[derive(Debug, Default)]
struct PartialU16 {
    high: Option<u8>,
}

impl PartialU16 {
    fn push(&mut self, byte: u8) -> Option<u16> {
        match self.high.take() {
            None => {
                self.high = Some(byte);
                None
            }
            Some(high) => Some(u16::from_be_bytes([high, byte])),
        }
    }
}

pub type DecodeResult = Result<Message, ProtocolError>;

#[derive(Debug)]
pub struct MessageDecoder {
    stage: Stage,
    word: PartialU16,
    size: u16,
    topic: Topic,
    payload: BytesMut,
    payload_len: usize,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self {
            stage: Stage::AwaitLength,
            word: PartialU16::default(),
            size: 0,
            topic: 0,
            payload: BytesMut::new(),
            payload_len: 0,
        }
    }

    /// Feed a single byte, returning whatever it completes.
    pub fn feed(&mut self, byte: u8) -> Option<DecodeResult> {
        let (_, out) = self.step(&[byte]);
        out
    }

    /// Lazily decode `input`.
    ///
    /// Bytes are consumed only as the returned iterator is advanced; drive
    /// it to completion to hand the whole buffer to the decoder.
    pub fn decode<'a>(&'a mut self, input: &'a [u8]) -> Decode<'a> {
        Decode {
            decoder: self,
            input,
        }
    }

    /// True when the decoder sits on a frame boundary.
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::AwaitLength && self.word.high.is_none()
    }

    /// Advance by at least one byte of a non-empty `input`.
    ///
    /// Returns how many bytes were consumed and the message (or error) they
    /// completed, if any. Payload and skipped bytes are taken in bulk.
    fn step(&mut self, input: &[u8]) -> (usize, Option<DecodeResult>) {
        debug_assert!(!input.is_empty());

        match self.stage {
            Stage::AwaitLength => {
                let Some(size) = self.word.push(input[0]) else {
                    return (1, None);
                };
                if size == 0 {
                    return (1, Some(Ok(Message::Ping)));
                }
                self.size = size;
                self.stage = Stage::AwaitType;
                (1, None)
            }
            Stage::AwaitType => {
                let byte = input[0];
                let remainder = usize::from(self.size) - 1;
                match MessageType::from_byte(byte) {
                    None => {
                        self.skip(remainder);
                        (1, Some(Err(ProtocolError::UnknownType(byte))))
                    }
                    Some(kind) if usize::from(self.size) < HEADER_LEN => {
                        self.skip(remainder);
                        let err = ProtocolError::FrameTooShort {
                            kind,
                            size: self.size,
                        };
                        (1, Some(Err(err)))
                    }
                    Some(kind) => {
                        self.stage = Stage::AwaitTopic(kind);
                        (1, None)
                    }
                }
            }
            Stage::AwaitTopic(kind) => {
                let Some(topic) = self.word.push(input[0]) else {
                    return (1, None);
                };
                let body = usize::from(self.size) - HEADER_LEN;
                let message = match kind {
                    MessageType::Sub => {
                        self.skip(body);
                        Message::Sub { topic }
                    }
                    MessageType::Unsub => {
                        self.skip(body);
                        Message::Unsub { topic }
                    }
                    MessageType::Pub if body == 0 => {
                        self.stage = Stage::AwaitLength;
                        Message::Pub {
                            topic,
                            payload: Bytes::new(),
                        }
                    }
                    MessageType::Pub => {
                        self.topic = topic;
                        self.payload = BytesMut::with_capacity(body);
                        self.payload_len = body;
                        self.stage = Stage::AwaitPayload;
                        return (1, None);
                    }
                };
                (1, Some(Ok(message)))
            }
            Stage::AwaitPayload => {
                let wanted = self.payload_len - self.payload.len();
                let n = wanted.min(input.len());
                self.payload.extend_from_slice(&input[..n]);
                if self.payload.len() < self.payload_len {
                    return (n, None);
                }
                self.stage = Stage::AwaitLength;
                let payload = std::mem::take(&mut self.payload).freeze();
                let message = Message::Pub {
                    topic: self.topic,
                    payload,
                };
                (n, Some(Ok(message)))
            }
            Stage::Skip(remaining) => {
                let n = remaining.min(input.len());
                self.skip(remaining - n);
                (n, None)
            }
        }
    }

    fn skip(&mut self, n: usize) {
        self.stage = if n == 0 {
            Stage::AwaitLength
        } else {
            Stage::Skip(n)
        };
    }
}

/// Iterator returned by [`MessageDecoder::decode`].
pub struct Decode<'a> {
    decoder: &'a mut MessageDecoder,
    input: &'a [u8],
}

impl Decode<'_> {
    /// Bytes not yet handed to the decoder.
    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl Iterator for Decode<'_> {
    type Item = DecodeResult;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.input.is_empty() {
            let (used, out) = self.decoder.step(self.input);
            self.input = &self.input[used..];
            if out.is_some() {
                return out;
            }
        }
        None
    }
}
