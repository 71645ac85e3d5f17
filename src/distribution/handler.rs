//! Per-connection WebSocket session task (spec.md §4.4, §6.1).
//!
//! Each upgraded socket is split into a reader half (decodes inbound
//! control frames) and a writer half (drains the connection's bounded
//! send queue); a `tokio::select!` loop owns both plus the shutdown
//! signal, the way the teacher's own socket handler is structured.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::Principal;
use crate::shutdown::ShutdownToken;

use super::codec::Codec;
use super::connection::Connection;
use super::envelope::{ClientMessage, Envelope, ErrorPayload, MessageType, Payload, SubscriptionPayload};
use super::pool::ConnectionPool;

pub async fn handle_socket(
    socket: WebSocket,
    pool: Arc<ConnectionPool>,
    principal: Principal,
    remote_addr: Option<SocketAddr>,
    codec: Codec,
    shutdown: ShutdownToken,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel(pool.config().send_buffer);

    let connection = Connection::new(principal, remote_addr, matches!(codec, Codec::Binary), send_tx);
    let connection_id = pool.register(connection, codec);
    tracing::info!(connection_id = %connection_id, "connection opened");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,

            outgoing = send_rx.recv() => {
                match outgoing {
                    Some(Message::Close(_)) | None => break,
                    Some(message) => {
                        if ws_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(message)) => {
                        if matches!(message, Message::Close(_)) {
                            break;
                        }
                        if matches!(message, Message::Ping(_) | Message::Pong(_)) {
                            pool.touch_pong(connection_id);
                            continue;
                        }
                        pool.record_received(connection_id);
                        handle_client_frame(&pool, connection_id, &message);
                    }
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %connection_id, error = %err, "read error, closing connection");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    pool.remove(connection_id);
    tracing::info!(connection_id = %connection_id, "connection closed");
}

fn handle_client_frame(pool: &Arc<ConnectionPool>, connection_id: super::ConnectionId, message: &Message) {
    let now = chrono::Utc::now().timestamp();
    let parsed = Codec::decode_client_frame(message);

    let reply = match parsed {
        Ok(ClientMessage::Subscribe { channel, symbol }) => {
            pool.subscribe(connection_id, channel, symbol.as_deref());
            Some(Envelope::new(MessageType::Subscribed, now).with_data(Payload::Subscription(SubscriptionPayload {
                channel,
                symbol,
            })))
        }
        Ok(ClientMessage::Unsubscribe { channel, symbol }) => {
            pool.unsubscribe(connection_id, channel, symbol.as_deref());
            Some(
                Envelope::new(MessageType::Unsubscribed, now)
                    .with_data(Payload::Subscription(SubscriptionPayload { channel, symbol })),
            )
        }
        Ok(ClientMessage::Ping { timestamp }) => {
            // The heartbeat lane emits an application-level `Heartbeat`
            // envelope rather than a WS-protocol `Ping` frame, so a
            // well-behaved client answering only at the application
            // level would never hit the `Message::Ping | Message::Pong`
            // arm above and would be reaped at `pong_timeout` despite
            // being alive. Treat this app-level `ping` as liveness too.
            pool.touch_pong(connection_id);
            Some(Envelope::new(MessageType::Pong, timestamp))
        }
        Ok(ClientMessage::Auth { .. }) => {
            // A credential is required at upgrade time in this
            // implementation (see `routes::ws_handler`), so a later
            // `auth` frame is redundant; acknowledge without error.
            Some(Envelope::new(MessageType::Pong, now))
        }
        Err(err) => Some(Envelope::error(
            "INVALID_REQUEST",
            err.to_string(),
            now,
        )),
    };

    if let Some(envelope) = reply {
        if let Err(err) = pool.send_to(connection_id, &envelope) {
            tracing::debug!(connection_id = %connection_id, error = %err, "failed to send reply frame");
        }
    }
}

/// Helper for transport adapters that need to report a `PlatformError`
/// to one connection without the full subscribe/unsubscribe path.
pub fn error_envelope(code: &str, message: impl Into<String>, now: i64) -> Envelope {
    Envelope::new(MessageType::Error, now).with_data(Payload::Error(ErrorPayload {
        code: code.to_string(),
        message: message.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::distribution::pool::BusConfig;

    fn principal() -> Principal {
        Principal {
            user_id: crate::models::UserId::from("u1"),
            roles: Default::default(),
        }
    }

    /// An app-level `ping` (spec.md §6.1) must reset the pong clock the
    /// same way a WS-protocol `Ping`/`Pong` frame does, since the
    /// server's heartbeat lane pushes an application `heartbeat`
    /// envelope rather than a WS `Ping` — a client that only ever
    /// answers at the application level would otherwise never touch the
    /// pong clock and get reaped by `stale_connections`.
    #[test]
    fn app_level_ping_resets_pong_clock() {
        let pool = ConnectionPool::new(BusConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let connection_id = pool.register(Connection::new(principal(), None, false, tx), Codec::Json);

        // Simulate a connection that's gone quiet long enough to be stale.
        pool.age_pong_for_test(connection_id, pool.config().pong_timeout.as_secs() as i64 + 1);
        assert!(pool.stale_connections().contains(&connection_id));

        let ping = Message::Text(r#"{"type":"ping","timestamp":1234}"#.to_string());
        handle_client_frame(&pool, connection_id, &ping);

        assert!(!pool.stale_connections().contains(&connection_id));
    }
}
