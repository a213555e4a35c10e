//! Raw TCP transport
//!
//! Accepts connections and runs one task per connection:
//! - a writer task drains the connection's `Client` channel onto the socket
//! - the reader feeds every chunk received into the connection's own
//!   `MessageDecoder` and hands decoded messages to the `Broker`
//!
//! A connection ends on EOF, a read error, the idle timeout, or (when
//! `close_on_malformed` is set) the first malformed frame. A peer that stops
//! reading ends it too: each socket write gets the same deadline as an idle
//! read. All of these end in a single `Broker::disconnect` call.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::broker::Broker;
use crate::client::{Client, ConnectionId};
use crate::config::{ServerSettings, Settings};
use crate::protocol::MessageDecoder;
use crate::utils::error::{ProtocolError, Result};

const READ_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub(super) enum CloseReason {
    #[error("peer closed the connection")]
    Eof,
    #[error("idle timeout")]
    IdleTimeout,
    #[error("malformed frame: {0}")]
    Malformed(ProtocolError),
    #[error("read failed: {0}")]
    Io(std::io::Error),
    #[error("write timed out")]
    WriteTimeout,
    #[error("write failed: {0}")]
    WriteFailed(std::io::Error),
}

/// Bind the configured address and serve until the task is dropped.
pub async fn start_tcp_server(settings: Settings, broker: Arc<Broker>) -> Result<()> {
    let listener = TcpListener::bind(settings.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "TCP server listening");
    serve(listener, broker, settings).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, broker: Arc<Broker>, settings: Settings) -> Result<()> {
    let server = Arc::new(settings.server);
    let limit = match settings.broker.max_connections {
        0 => None,
        n => Some(Arc::new(Semaphore::new(n))),
    };

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let permit = match &limit {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(peer = %peer, "Connection rejected: limit reached");
                    continue;
                }
            },
            None => None,
        };

        if server.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let broker = Arc::clone(&broker);
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            handle_connection(socket, peer, broker, &server).await;
            drop(permit);
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    settings: &ServerSettings,
) {
    let (mut reader, writer) = socket.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let client = Client::new(tx);
    let id = client.id;

    info!(client = %id, peer = %peer, "Client connected");

    // Keeps flushing after the reader is done; ends once every sender is
    // gone, ours and the registry's clones removed by `disconnect`.
    let mut send_loop = tokio::spawn(write_loop(writer, rx, deadline(settings), id));

    let reason = tokio::select! {
        reason = read_loop(&mut reader, &client, &broker, settings) => reason,
        Ok(Some(reason)) = &mut send_loop => reason,
    };

    broker.disconnect(&id);
    let lived = Utc::now() - client.connected_at;
    info!(
        client = %id,
        peer = %peer,
        reason = %reason,
        session_secs = lived.num_seconds(),
        "Client disconnected"
    );
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    client: &Client,
    broker: &Broker,
    settings: &ServerSettings,
) -> CloseReason {
    let idle = deadline(settings);
    let mut decoder = MessageDecoder::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buf);
        let outcome = match idle {
            Some(limit) => match timeout(limit, read).await {
                Ok(outcome) => outcome,
                Err(_) => return CloseReason::IdleTimeout,
            },
            None => read.await,
        };
        let n = match outcome {
            Ok(0) => return CloseReason::Eof,
            Ok(n) => n,
            Err(e) => return CloseReason::Io(e),
        };

        for item in decoder.decode(&buf[..n]) {
            match item {
                Ok(message) => {
                    trace!(client = %client.id, %message, "Received");
                    broker.handle(client, message);
                }
                Err(e) if settings.close_on_malformed => return CloseReason::Malformed(e),
                Err(e) => warn!(client = %client.id, error = %e, "Skipped malformed frame"),
            }
        }
    }
}

/// Drain `frames` onto `writer`, giving each write at most `limit`.
///
/// Returns `None` once the channel closes, or the reason writing stopped
/// early. Frames still queued at that point are dropped with the channel.
pub(super) async fn write_loop<W>(
    mut writer: W,
    mut frames: UnboundedReceiver<Bytes>,
    limit: Option<Duration>,
    id: ConnectionId,
) -> Option<CloseReason>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let write = writer.write_all(&frame);
        let outcome = match limit {
            Some(limit) => match timeout(limit, write).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(client = %id, queued = frames.len(), "Write timed out, peer not reading");
                    return Some(CloseReason::WriteTimeout);
                }
            },
            None => write.await,
        };
        if let Err(e) = outcome {
            debug!(client = %id, error = %e, "Write failed");
            return Some(CloseReason::WriteFailed(e));
        }
    }

    let _ = writer.shutdown().await;
    trace!(client = %id, "Send loop closed");
    None
}

fn deadline(settings: &ServerSettings) -> Option<Duration> {
    (settings.idle_timeout_secs > 0).then(|| Duration::from_secs(settings.idle_timeout_secs))
}
