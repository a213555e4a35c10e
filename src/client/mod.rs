//! The `client` module defines the representation of a client in the Pub/Sub system.
//!
//! It provides the `Client` struct, the connection handle the broker keeps
//! in its subscription indices, and `console`, a small interactive client
//! used by the `client` subcommand.

pub mod console;
pub mod pubsub_client;
pub use pubsub_client::{Client, ConnectionId};
