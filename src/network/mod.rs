//! Network module - framing, wire messages, handshake, connection, MiniNode client.
//! Exposes MiniNode, Connection, Event types.

pub mod codec;
pub mod connection;
pub mod handshake;
pub mod message;
pub mod mini_node;
pub mod runtime;
pub mod stats;
pub mod transport;

pub use connection::{handler_fn, Connection, ConnectionState, EventHandler};
pub use handshake::NodeMetadata;
pub use message::{build_message, event, Event, ResultsCase};
pub use mini_node::MiniNode;
pub use runtime::PeerRuntime;
pub use stats::MessageStats;
