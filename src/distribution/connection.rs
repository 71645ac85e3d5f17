//! A single upgraded WebSocket session (spec.md §3 "Connection").
//! `ConnectionPool` is the exclusive owner of `Connection` records;
//! every other component refers to one only by [`ConnectionId`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::Principal;

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
        write!(f, "{}", self.0)
    }
}

/// Per-connection message/byte counters, read by the `GET
/// /internal/bus/stats` snapshot (spec.md §4.4 "Instrumentation").
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub last_pong_unix: AtomicI64,
}

impl ConnectionStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            last_pong_unix: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn touch_pong(&self) {
        self.last_pong_unix.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn seconds_since_pong(&self) -> i64 {
        Utc::now().timestamp() - self.last_pong_unix.load(Ordering::Relaxed)
    }
}

/// A connection's send side: a bounded queue drained by the writer
/// half of the connection task. Closure is idempotent (spec.md §3).
pub struct Connection {
    pub id: ConnectionId,
    pub principal: Principal,
    pub remote_addr: Option<SocketAddr>,
    pub binary: bool,
    sender: mpsc::Sender<Message>,
    pub stats: ConnectionStats,
}

impl Connection {
    pub fn new(principal: Principal, remote_addr: Option<SocketAddr>, binary: bool, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            principal,
            remote_addr,
            binary,
            sender,
            stats: ConnectionStats::new(),
        }
    }

    /// Non-blocking enqueue. `Err` means the send buffer is full — the
    /// caller (the pool's `publish`) treats this connection as slow and
    /// disconnects it; it never awaits here (spec.md §4.4 "Backpressure").
    pub fn try_send(&self, message: Message) -> Result<(), ()> {
        self.sender.try_send(message).map_err(|_| ())
    }

    pub fn close(&self) {
        // Dropping every clone of `sender` closes the channel; a plain
        // `mpsc::Sender` has no explicit close, so the writer task exits
        // when the channel is empty and every sender is gone. Idempotent:
        // calling this on an already-closed connection is a no-op send failure.
        let _ = self.sender.try_send(Message::Close(None));
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.principal.user_id)
            .field("binary", &self.binary)
            .finish()
    }
}
