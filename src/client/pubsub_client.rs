use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::utils::error::ClientError;

/// Stable identity of one connection, valid for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0.simple())
    }
}

/// Represents a connected TCP client in the Pub/Sub system.
///
/// The handle is cheap to clone and compares by `id` only, so every clone
/// stands for the same connection.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: ConnectionId,

    /// Channel feeding the connection's writer task with encoded frames.
    pub sender: UnboundedSender<Bytes>,

    pub connected_at: DateTime<Utc>,
}

impl Client {
    pub fn new(sender: UnboundedSender<Bytes>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Queue a frame for the connection without waiting on the socket.
    pub fn send(&self, frame: Bytes) -> Result<(), ClientError> {
        self.sender
            .send(frame)
            .map_err(|_| ClientError::Closed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Client {}

impl std::hash::Hash for Client {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
