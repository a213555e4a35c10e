//! The `error` module defines the error types used across `subcast`.
//!
//! Each layer has its own enum (`ProtocolError`, `WorkerError`,
//! `ClientError`); `Error` aggregates them together with I/O and
//! configuration failures for the binary entry points.

use thiserror::Error;

use crate::client::ConnectionId;
use crate::protocol::MessageType;

/// Malformed or unencodable frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("{kind} frame declares {size} bytes, header needs 3")]
    FrameTooShort { kind: MessageType, size: u16 },
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker {0} is no longer running")]
    WorkerUnavailable(usize),
    #[error("worker pool needs at least one worker")]
    EmptyPool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, Error>;
