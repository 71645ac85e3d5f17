//! Realtime Distribution Bus (spec.md §4.4): a connection pool and
//! channel/symbol-keyed pub/sub that fans out market data, order
//! updates, and trade prints to authenticated WebSocket subscribers.
//!
//! ```text
//! handler::handle_socket (per connection)
//!   ├→ connection::Connection (send queue, principal, stats)
//!   ├→ subscription::SubscriptionIndex (channel/symbol → connections)
//!   └→ pool::ConnectionPool (owns connections, runs publish)
//! ```
//!
//! `pool::ConnectionPool` exclusively owns connection records (spec.md
//! §3 "Ownership summary"); every other component refers to a
//! connection only by its [`connection::ConnectionId`] and looks it up
//! through the pool (spec.md §9 "Cyclic references").

pub mod codec;
pub mod connection;
pub mod envelope;
pub mod handler;
pub mod pool;
pub mod routes;
pub mod subscription;

pub use codec::Codec;
pub use connection::{Connection, ConnectionId};
pub use envelope::{Envelope, MessageType, Payload};
pub use pool::{BusConfig, BusStats, ConnectionPool};
pub use subscription::Channel;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("unauthenticated connection")]
    Unauthenticated,

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    #[error("send queue full, connection treated as slow")]
    SendQueueFull,

    #[error("malformed frame: {0}")]
    Codec(String),
}
