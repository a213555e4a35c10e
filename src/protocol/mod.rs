//! The `protocol` module implements the binary wire format spoken over raw
//! TCP: a big-endian length prefix, a type byte, a 16-bit topic and, for
//! publishes, the payload.
//!
//! Encoding is stateless (`codec`); decoding is an incremental state
//! machine (`decoder`) that tolerates any fragmentation of the stream.

pub mod codec;
pub mod decoder;
pub mod message;

pub use decoder::{Decode, MessageDecoder};
pub use message::{Message, MessageType, Topic};

#[cfg(test)]
mod tests;
