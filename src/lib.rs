//! # subcast
//!
//! `subcast` is an in-memory, topic-based publish/subscribe broker spoken
//! over raw TCP with a compact binary framing. Clients subscribe to 16-bit
//! topics, publish payloads to them and keep idle connections alive with
//! PING. Payloads carrying a transform prefix are run through a pool of
//! worker threads before being published.
//!
//! ## Core Modules
//!
//! - `protocol`: wire format encoding and the incremental frame decoder.
//! - `broker`: the subscription registry and the `Broker` that wires decoded messages into it.
//! - `worker`: CPU-bound payload transforms and the round-robin worker pool that runs them.
//! - `client`: the per-connection handle and an interactive console client.
//! - `config`: loading and merging server configuration.
//! - `transport`: the TCP accept loop and per-connection lifecycle.
//! - `utils`: error types and logging.

pub mod broker;
pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod utils;
pub mod worker;
