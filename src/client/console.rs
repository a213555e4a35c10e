//! Interactive console client
//!
//! Subscribes to one topic, prints every frame the broker sends back and
//! publishes each line read from stdin. A line consisting of `ping` sends a
//! PING instead.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::protocol::{Message, MessageDecoder, Topic};
use crate::utils::error::Result;

pub async fn run(addr: &str, topic: Topic) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    writer.write_all(&Message::Sub { topic }.encode()?).await?;

    let printer = tokio::spawn(async move {
        let mut decoder = MessageDecoder::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Read failed");
                    break;
                }
            };
            for item in decoder.decode(&buf[..n]) {
                match item {
                    Ok(msg) => println!("< {msg}"),
                    Err(e) => warn!(error = %e, "Malformed frame from broker"),
                }
            }
        }
        debug!("Broker closed the connection");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let msg = if line.trim() == "ping" {
            Message::Ping
        } else {
            Message::publish(topic, line.into_bytes())
        };
        writer.write_all(&msg.encode()?).await?;
    }

    writer.shutdown().await?;
    printer.abort();
    Ok(())
}
