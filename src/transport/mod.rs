//! The `transport` module is responsible for handling network communication
//! with clients over raw TCP.
//!
//! It owns the accept loop and the per-connection lifecycle: reading bytes
//! into a decoder, writing frames back, enforcing the idle timeout and
//! reporting each disconnect to the broker exactly once.

pub mod tcp;

pub use tcp::{serve, start_tcp_server};
